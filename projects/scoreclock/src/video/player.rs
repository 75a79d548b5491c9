use anyhow::{anyhow, Result};
use opencv::{
    highgui,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_POS_MSEC},
};
use std::path::Path;

const WINDOW_NAME: &str = "scoreclock";
const KEY_ESC: i32 = 27;
const KEY_Q: i32 = 'q' as i32;

/// Position playback should start from: `lead_in_ms` before the offset.
pub fn start_position(offset_ms: u64, lead_in_ms: u64) -> u64 {
    offset_ms.saturating_sub(lead_in_ms)
}

/// Plays `video_path` from shortly before `offset_ms` until the stream ends
/// or the user presses `q`/`Esc`. Blocks the calling thread.
pub fn play_from(video_path: &Path, offset_ms: u64, lead_in_ms: u64) -> Result<()> {
    let path_str = video_path
        .to_str()
        .ok_or_else(|| anyhow!("Video path is not valid UTF-8: {}", video_path.display()))?;
    let mut capture = VideoCapture::from_file(path_str, CAP_ANY)?;
    if !capture.is_opened()? {
        return Err(anyhow!("Failed to open video file: {}", video_path.display()));
    }

    let start = start_position(offset_ms, lead_in_ms);
    capture.set(CAP_PROP_POS_MSEC, start as f64)?;

    let fps = capture.get(CAP_PROP_FPS)?;
    let delay_ms = if fps > 0.0 {
        (1000.0 / fps).round().max(1.0) as i32
    } else {
        33
    };

    highgui::named_window(WINDOW_NAME, highgui::WINDOW_NORMAL)?;
    highgui::resize_window(WINDOW_NAME, 1280, 720)?;
    tracing::info!("Playing {} from {} ms", video_path.display(), start);

    let mut frame = Mat::default();
    loop {
        if !capture.read(&mut frame)? || frame.empty() {
            break;
        }
        highgui::imshow(WINDOW_NAME, &frame)?;
        let key = highgui::wait_key(delay_ms)?;
        if key == KEY_ESC || key == KEY_Q {
            break;
        }
    }

    highgui::destroy_window(WINDOW_NAME)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_position_saturates() {
        assert_eq!(start_position(20_000, 3_000), 17_000);
        assert_eq!(start_position(2_000, 3_000), 0);
    }
}
