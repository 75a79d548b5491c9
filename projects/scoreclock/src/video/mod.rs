pub mod opencv_reader;
pub mod player;

use anyhow::Result;
use opencv::core::Mat;

/// Random-access frame source addressed by playback offset.
pub trait VideoReader {
    fn duration_ms(&self) -> Result<u64>;
    fn source_fps(&self) -> Result<f64>;
    /// Returns the frame at `offset_ms`, or `None` once the stream has nothing left.
    fn read_at(&mut self, offset_ms: u64) -> Result<Option<Mat>>;
}
