// OCR wrapper around `ocr-rs` (Rust PaddleOCR bindings).

use crate::pipeline::TextReader;
use anyhow::{anyhow, Context, Result};
use opencv::core::Mat;
use opencv::prelude::*;
use std::path::Path;

pub struct ScoreboardOcr {
    engine: ocr_rs::OcrEngine,
}

impl ScoreboardOcr {
    /// Loads the text detection and recognition models plus the charset.
    pub fn new(
        detection: impl AsRef<Path>,
        recognition: impl AsRef<Path>,
        charset: impl AsRef<Path>,
    ) -> Result<Self> {
        let thread_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let engine = ocr_rs::OcrEngine::new(
            detection,
            recognition,
            charset,
            Some(ocr_rs::OcrEngineConfig {
                backend: ocr_rs::Backend::CPU,
                thread_count,
                // Scoreboard digits are small and stylised.
                precision_mode: ocr_rs::PrecisionMode::High,
                enable_parallel: thread_count > 1,
                min_result_confidence: 0.5,
                ..Default::default()
            }),
        )
        .context("failed to initialize OCR engine (missing or invalid model files?)")?;

        tracing::info!("Loaded OCR engine ({} threads)", thread_count);
        Ok(Self { engine })
    }
}

impl TextReader for ScoreboardOcr {
    fn read_text(&mut self, image: &Mat) -> Result<Vec<String>> {
        let (bytes, width, height) = mat_to_rgb_bytes(image)?;
        let image = ocr_rs::preprocess::rgb_to_image(&bytes, width, height);

        let results = self
            .engine
            .recognize(&image)
            .map_err(|e| anyhow!("OCR failed: {}", e))?;

        Ok(results
            .into_iter()
            .map(|r| r.text)
            .filter(|t| !t.trim().is_empty())
            .collect())
    }
}

/// Packed RGB bytes of a BGR Mat.
fn mat_to_rgb_bytes(mat: &Mat) -> Result<(Vec<u8>, u32, u32)> {
    let mut rgb = Mat::default();
    opencv::imgproc::cvt_color_def(mat, &mut rgb, opencv::imgproc::COLOR_BGR2RGB)?;
    if !rgb.is_continuous() {
        return Err(anyhow!("Mat is not continuous"));
    }
    let size = rgb.size()?;
    Ok((
        rgb.data_bytes()?.to_vec(),
        size.width as u32,
        size.height as u32,
    ))
}
