use crate::pipeline::crop::{crop_pixels, PixelBox};
use crate::pipeline::ScoreboardLocator;
use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageBuffer, Rgb};
use opencv::core::Mat;
use opencv::prelude::*;
use usls::models::RTDETR;
use usls::{Config, Image};

const CLASS_NAMES: [&str; 1] = ["scoreboard"];

/// Scoreboard detector backed by a single-class USLS RT-DETR model.
///
/// Handles BGR-to-RGB conversion and corrects for the aspect-ratio padding
/// bug in the underlying model library.
pub struct ScoreboardDetector {
    model: RTDETR,
    min_confidence: f32,
}

impl ScoreboardDetector {
    pub fn new(model_path: &str, min_confidence: f32) -> Result<Self> {
        let config = Config::default()
            .with_model_file(model_path)
            .with_class_names(&CLASS_NAMES);

        #[cfg(target_os = "macos")]
        let config = config.with_model_device(usls::Device::CoreMl);

        let config = config.commit()?;
        let model = RTDETR::new(config)?;
        tracing::info!("Loaded scoreboard detector from {}", model_path);
        Ok(Self {
            model,
            min_confidence,
        })
    }

    /// Runs detection and returns the most confident scoreboard box.
    pub fn detect(&mut self, image: &Mat) -> Result<Option<PixelBox>> {
        let dynamic_image = mat_to_dynamic_image(image)?;

        let size = image.size()?;
        let img_w = size.width as f32;
        let img_h = size.height as f32;
        let (x_corr, y_corr) = aspect_correction(img_w, img_h);

        let usls_images = vec![Image::from(dynamic_image)];
        let results = self.model.forward(&usls_images)?;
        let Some(y) = results.into_iter().next() else {
            return Ok(None);
        };

        let candidates: Vec<Candidate> = y
            .hbbs
            .iter()
            .map(|hbb| Candidate {
                confidence: hbb.confidence(),
                xmin: hbb.xmin(),
                ymin: hbb.ymin(),
                width: hbb.width(),
                height: hbb.height(),
            })
            .collect();

        let best = best_box(&candidates, self.min_confidence, (x_corr, y_corr));
        Ok(best)
    }
}

impl ScoreboardLocator for ScoreboardDetector {
    fn locate(&mut self, frame: &Mat) -> Result<Option<Mat>> {
        match self.detect(frame)? {
            Some(bbox) => {
                tracing::trace!("Scoreboard at {:?}", bbox);
                Ok(Some(crop_pixels(frame, &bbox)?))
            }
            None => Ok(None),
        }
    }
}

/// A raw model box in padded-model coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    confidence: Option<f32>,
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
}

/// Picks the most confident box at or above `min_confidence` and maps it back
/// to frame pixels. Boxes without a score count as zero confidence.
fn best_box(
    candidates: &[Candidate],
    min_confidence: f32,
    (x_corr, y_corr): (f32, f32),
) -> Option<PixelBox> {
    candidates
        .iter()
        .map(|c| (c.confidence.unwrap_or(0.0), c))
        .filter(|(conf, _)| *conf >= min_confidence)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| {
            let x = c.xmin * x_corr;
            let y = c.ymin * y_corr;
            PixelBox {
                x1: x,
                y1: y,
                x2: x + c.width * x_corr,
                y2: y + c.height * y_corr,
            }
        })
}

/// Scale factors undoing the model's square-padding distortion.
fn aspect_correction(img_w: f32, img_h: f32) -> (f32, f32) {
    if img_w > img_h {
        (img_w / img_h, 1.0)
    } else if img_h > img_w {
        (1.0, img_h / img_w)
    } else {
        (1.0, 1.0)
    }
}

/// Convert an OpenCV Mat (BGR) to an image::DynamicImage (RGB)
fn mat_to_dynamic_image(mat: &Mat) -> Result<DynamicImage> {
    let mut rgb_mat = Mat::default();
    opencv::imgproc::cvt_color_def(mat, &mut rgb_mat, opencv::imgproc::COLOR_BGR2RGB)?;

    let size = rgb_mat.size()?;
    let width = size.width as u32;
    let height = size.height as u32;

    if !rgb_mat.is_continuous() {
        return Err(anyhow!("Mat is not continuous"));
    }

    let buffer = rgb_mat.data_bytes()?.to_vec();
    let img_buffer = ImageBuffer::<Rgb<u8>, _>::from_vec(width, height, buffer)
        .ok_or_else(|| anyhow!("Failed to create ImageBuffer from Mat data"))?;

    Ok(DynamicImage::ImageRgb8(img_buffer))
}
