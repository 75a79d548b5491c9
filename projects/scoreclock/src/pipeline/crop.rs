use anyhow::Result;
use opencv::core;
use opencv::prelude::*;

/// Pixel-space box in `xyxy` form, as detectors report it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Integer ROI covering `bbox`: edges floored/ceiled outward and clamped to
/// the image. `None` when nothing of the box lies inside the image.
pub fn roi_for(bbox: &PixelBox, width: i32, height: i32) -> Option<core::Rect> {
    let x1 = (bbox.x1.floor() as i32).clamp(0, width);
    let y1 = (bbox.y1.floor() as i32).clamp(0, height);
    let x2 = (bbox.x2.ceil() as i32).clamp(0, width);
    let y2 = (bbox.y2.ceil() as i32).clamp(0, height);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(core::Rect::new(x1, y1, x2 - x1, y2 - y1))
}

/// Crops a Mat to a pixel-space bounding box.
pub fn crop_pixels(img: &core::Mat, bbox: &PixelBox) -> Result<core::Mat> {
    let size = img.size()?;
    let roi = roi_for(bbox, size.width, size.height).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid crop for {}x{} image (bbox: {:?})",
            size.width,
            size.height,
            bbox
        )
    })?;

    let cropped = core::Mat::roi(img, roi)?;
    let mut out = core::Mat::default();
    cropped.copy_to(&mut out)?;

    Ok(out)
}
