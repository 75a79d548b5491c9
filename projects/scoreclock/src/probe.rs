// Single-image diagnostic: what does the pipeline read from one frame?

use crate::mapping::builder::{classify_fragments, FrameOutcome};
use crate::pipeline::extract::{FrameReading, SkipReason};
use crate::pipeline::{ScoreboardLocator, TextReader};
use anyhow::{anyhow, Result};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::{highgui, imgcodecs};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProbeReport {
    pub scoreboard_found: bool,
    pub fragments: Vec<String>,
    pub timestamps: Vec<String>,
    pub added_time: bool,
    pub key: Option<String>,
    pub skip_reason: Option<String>,
}

pub fn probe_frame<L, T>(
    frame: &Mat,
    locator: &mut L,
    ocr: &mut T,
) -> Result<(ProbeReport, Option<Mat>)>
where
    L: ScoreboardLocator + ?Sized,
    T: TextReader + ?Sized,
{
    let crop = locator.locate(frame)?;
    let fragments = match &crop {
        Some(image) => ocr.read_text(image)?,
        None => Vec::new(),
    };

    let (outcome, reading) = match crop {
        Some(_) => classify_fragments(&fragments),
        None => (
            FrameOutcome::Skipped(SkipReason::NoScoreboard),
            FrameReading::from_fragments(&fragments),
        ),
    };
    let (key, skip_reason) = match outcome {
        FrameOutcome::Key(key) => (Some(key), None),
        FrameOutcome::Skipped(reason) => (None, Some(reason.to_string())),
    };

    let report = ProbeReport {
        scoreboard_found: crop.is_some(),
        fragments,
        timestamps: reading.timestamps,
        added_time: reading.added_time,
        key,
        skip_reason,
    };

    Ok((report, crop))
}

/// Probes an image file. With `show`, the cropped scoreboard is displayed
/// until a key is pressed.
pub fn probe_image<L, T>(path: &Path, locator: &mut L, ocr: &mut T, show: bool) -> Result<ProbeReport>
where
    L: ScoreboardLocator + ?Sized,
    T: TextReader + ?Sized,
{
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("Image path is not valid UTF-8: {}", path.display()))?;
    let frame = imgcodecs::imread(path_str, imgcodecs::IMREAD_COLOR)?;
    if frame.empty() {
        return Err(anyhow!("Failed to read image: {}", path.display()));
    }

    let (report, crop) = probe_frame(&frame, locator, ocr)?;

    if show {
        let image = crop.as_ref().unwrap_or(&frame);
        highgui::imshow("scoreclock probe", image)?;
        highgui::wait_key(0)?;
        highgui::destroy_all_windows()?;
    }

    Ok(report)
}
