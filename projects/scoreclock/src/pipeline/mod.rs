// Per-frame reading pipeline: locate scoreboard -> OCR -> extract clock

pub mod crop;
pub mod detection;
pub mod extract;
pub mod ocr;

use anyhow::Result;
use opencv::core::Mat;

/// Finds the scoreboard on a full frame and returns it cropped.
pub trait ScoreboardLocator {
    fn locate(&mut self, frame: &Mat) -> Result<Option<Mat>>;
}

/// Reads text fragments from a cropped scoreboard, one string per text box.
pub trait TextReader {
    fn read_text(&mut self, image: &Mat) -> Result<Vec<String>>;
}
