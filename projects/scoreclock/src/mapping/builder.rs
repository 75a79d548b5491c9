// Mapping pass: sample the video at a fixed step and record which clock
// reading the scoreboard showed at each sampled offset.

use crate::clock::format_clock;
use crate::mapping::MappingTable;
use crate::pipeline::extract::{FrameReading, SkipReason};
use crate::pipeline::{ScoreboardLocator, TextReader};
use crate::video::VideoReader;
use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use opencv::core::Mat;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub sampled: usize,
    pub recorded: usize,
    pub skipped: usize,
    /// The reader ran out of frames before the reported duration.
    pub stopped_early: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Key(String),
    Skipped(SkipReason),
}

/// Runs one frame through locate -> OCR -> extract.
pub fn read_frame_key<L, T>(frame: &Mat, locator: &mut L, ocr: &mut T) -> Result<FrameOutcome>
where
    L: ScoreboardLocator + ?Sized,
    T: TextReader + ?Sized,
{
    let Some(scoreboard) = locator.locate(frame)? else {
        return Ok(FrameOutcome::Skipped(SkipReason::NoScoreboard));
    };

    let fragments = ocr.read_text(&scoreboard)?;
    Ok(classify_fragments(&fragments).0)
}

/// Classifies the OCR output of a located scoreboard, returning the parsed
/// reading alongside so callers can report what was seen.
pub fn classify_fragments<S: AsRef<str>>(fragments: &[S]) -> (FrameOutcome, FrameReading) {
    let reading = FrameReading::from_fragments(fragments);
    if fragments.is_empty() {
        return (FrameOutcome::Skipped(SkipReason::NoText), reading);
    }
    let outcome = match reading.canonical_key() {
        Ok(key) => FrameOutcome::Key(key),
        Err(reason) => FrameOutcome::Skipped(reason),
    };
    (outcome, reading)
}

/// Offsets sampled for a video of `duration_ms`, `step_secs` apart.
pub fn sample_offsets(duration_ms: u64, step_secs: u64) -> impl Iterator<Item = u64> {
    let count = if step_secs == 0 {
        0
    } else {
        duration_ms / 1000 / step_secs
    };
    (0..count).map(move |k| k * step_secs * 1000)
}

/// Builds the mapping table for a whole video.
///
/// Frames that yield no key are skipped. The pass ends early if the reader
/// stops returning frames; whatever was collected up to that point is kept.
pub fn build_mapping<V, L, T>(
    video: &mut V,
    locator: &mut L,
    ocr: &mut T,
    step_secs: u64,
) -> Result<(MappingTable, BuildStats)>
where
    V: VideoReader + ?Sized,
    L: ScoreboardLocator + ?Sized,
    T: TextReader + ?Sized,
{
    if step_secs == 0 {
        bail!("Step size must be at least one second");
    }

    let start_time = Instant::now();
    let duration_ms = video.duration_ms()?;
    let offsets: Vec<u64> = sample_offsets(duration_ms, step_secs).collect();

    tracing::info!(
        "Detecting scoreboards: {} samples over {:.1}s at {:.2} fps (step {}s)",
        offsets.len(),
        duration_ms as f64 / 1000.0,
        video.source_fps()?,
        step_secs
    );

    let pb = ProgressBar::new(offsets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow}, {eta})")?
            .progress_chars("#>-"),
    );

    let mut table = MappingTable::new();
    let mut stats = BuildStats::default();

    for offset in offsets {
        let frame = match video.read_at(offset) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::warn!("No frame at {} ms, ending mapping pass", offset);
                stats.stopped_early = true;
                break;
            }
            Err(e) => {
                tracing::warn!("Failed to read frame at {} ms: {}. Ending mapping pass", offset, e);
                stats.stopped_early = true;
                break;
            }
        };
        stats.sampled += 1;
        pb.inc(1);

        match read_frame_key(&frame, locator, ocr) {
            Ok(FrameOutcome::Key(key)) => {
                let video_time = format_clock(offset, false);
                tracing::debug!("{} -> {}", key, video_time);
                table.upsert(key, video_time);
                stats.recorded += 1;
            }
            Ok(FrameOutcome::Skipped(reason)) => {
                tracing::debug!("Skipping frame at {} ms: {}", offset, reason);
                stats.skipped += 1;
            }
            Err(e) => {
                tracing::warn!("Frame at {} ms failed: {}", offset, e);
                stats.skipped += 1;
            }
        }
    }

    pb.finish_and_clear();
    stats.elapsed = start_time.elapsed();

    tracing::info!(
        "Mapping pass done in {:.1}s: {} sampled, {} recorded, {} skipped, {} distinct readings",
        stats.elapsed.as_secs_f64(),
        stats.sampled,
        stats.recorded,
        stats.skipped,
        table.len()
    );

    Ok((table, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct FakeVideo {
        duration_ms: u64,
        /// Offsets at or beyond this return no frame.
        readable_until_ms: u64,
        /// Reading this offset fails with a decode error.
        broken_at_ms: Option<u64>,
        requested: Vec<u64>,
    }

    impl FakeVideo {
        fn new(duration_ms: u64) -> Self {
            Self {
                duration_ms,
                readable_until_ms: u64::MAX,
                broken_at_ms: None,
                requested: Vec::new(),
            }
        }
    }

    impl VideoReader for FakeVideo {
        fn duration_ms(&self) -> Result<u64> {
            Ok(self.duration_ms)
        }

        fn source_fps(&self) -> Result<f64> {
            Ok(25.0)
        }

        fn read_at(&mut self, offset_ms: u64) -> Result<Option<Mat>> {
            self.requested.push(offset_ms);
            if self.broken_at_ms == Some(offset_ms) {
                anyhow::bail!("corrupt packet at {} ms", offset_ms);
            }
            if offset_ms >= self.readable_until_ms {
                return Ok(None);
            }
            Ok(Some(Mat::default()))
        }
    }

    /// Finds a scoreboard on every frame.
    struct AlwaysLocate;

    impl ScoreboardLocator for AlwaysLocate {
        fn locate(&mut self, frame: &Mat) -> Result<Option<Mat>> {
            Ok(Some(frame.clone()))
        }
    }

    /// Finds a scoreboard only on every other frame.
    struct AlternateLocate {
        calls: usize,
    }

    impl ScoreboardLocator for AlternateLocate {
        fn locate(&mut self, frame: &Mat) -> Result<Option<Mat>> {
            self.calls += 1;
            Ok((self.calls % 2 == 1).then(|| frame.clone()))
        }
    }

    /// Returns scripted fragments per call.
    struct ScriptedOcr {
        script: VecDeque<Vec<&'static str>>,
    }

    impl ScriptedOcr {
        fn new(script: Vec<Vec<&'static str>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl TextReader for ScriptedOcr {
        fn read_text(&mut self, _image: &Mat) -> Result<Vec<String>> {
            Ok(self
                .script
                .pop_front()
                .unwrap_or_default()
                .into_iter()
                .map(String::from)
                .collect())
        }
    }

    /// Wraps another reader and fails on the listed call numbers (0-based).
    struct FailingOcr {
        inner: ScriptedOcr,
        fail_on: Vec<usize>,
        calls: usize,
    }

    impl TextReader for FailingOcr {
        fn read_text(&mut self, image: &Mat) -> Result<Vec<String>> {
            let call = self.calls;
            self.calls += 1;
            if self.fail_on.contains(&call) {
                anyhow::bail!("inference failed");
            }
            self.inner.read_text(image)
        }
    }

    /// Fails on every other frame, starting with the second.
    struct FailingLocate {
        calls: usize,
    }

    impl ScoreboardLocator for FailingLocate {
        fn locate(&mut self, frame: &Mat) -> Result<Option<Mat>> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                anyhow::bail!("detector backend error");
            }
            Ok(Some(frame.clone()))
        }
    }

    #[test]
    fn test_sample_offsets() {
        let offsets: Vec<_> = sample_offsets(10_500, 2).collect();
        assert_eq!(offsets, vec![0, 2_000, 4_000, 6_000, 8_000]);
        assert_eq!(sample_offsets(10_000, 0).count(), 0);
        assert_eq!(sample_offsets(999, 1).count(), 0);
    }

    #[test]
    fn test_builds_table_from_readings() {
        let mut video = FakeVideo::new(4_000);
        let mut ocr = ScriptedOcr::new(vec![
            vec!["CHE 0-0 ARS", "10:00"],
            vec!["10:01"],
            vec!["10.02"],
            vec!["10:03"],
        ]);

        let (table, stats) = build_mapping(&mut video, &mut AlwaysLocate, &mut ocr, 1).unwrap();

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("10:00", "00:00"),
                ("10:01", "00:01"),
                ("10:02", "00:02"),
                ("10:03", "00:03"),
            ]
        );
        assert_eq!(stats.sampled, 4);
        assert_eq!(stats.recorded, 4);
        assert!(!stats.stopped_early);
        assert_eq!(video.requested, vec![0, 1_000, 2_000, 3_000]);
    }

    #[test]
    fn test_skips_frames_without_text() {
        let mut video = FakeVideo::new(6_000);
        let mut ocr = ScriptedOcr::new(vec![
            vec!["20:00"],
            vec![],
            vec!["20:02"],
            vec![],
            vec!["20:04"],
            vec![],
        ]);

        let (table, stats) = build_mapping(&mut video, &mut AlwaysLocate, &mut ocr, 1).unwrap();

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(
            entries,
            vec![("20:00", "00:00"), ("20:02", "00:02"), ("20:04", "00:04")]
        );
        assert_eq!(stats.recorded, 3);
        assert_eq!(stats.skipped, 3);
    }

    #[test]
    fn test_skips_frames_without_scoreboard() {
        let mut video = FakeVideo::new(4_000);
        let mut locator = AlternateLocate { calls: 0 };
        // OCR is only consulted for frames where a scoreboard was found.
        let mut ocr = ScriptedOcr::new(vec![vec!["30:00"], vec!["30:02"]]);

        let (table, stats) = build_mapping(&mut video, &mut locator, &mut ocr, 1).unwrap();

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![("30:00", "00:00"), ("30:02", "00:02")]);
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn test_incomplete_added_time_is_skipped() {
        let mut video = FakeVideo::new(3_000);
        let mut ocr = ScriptedOcr::new(vec![
            vec!["45:00", "+"],
            vec!["45:00", "+1", "1:05"],
            vec!["45:00", "+1", "1:06"],
        ]);

        let (table, stats) = build_mapping(&mut video, &mut AlwaysLocate, &mut ocr, 1).unwrap();

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![("46:05+", "00:01"), ("46:06+", "00:02")]);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_last_sample_wins_for_repeated_reading() {
        let mut video = FakeVideo::new(6_000);
        let mut ocr = ScriptedOcr::new(vec![vec!["45:00"], vec!["46:00"], vec!["45:00"]]);

        let (table, _) = build_mapping(&mut video, &mut AlwaysLocate, &mut ocr, 2).unwrap();

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![("45:00", "00:04"), ("46:00", "00:02")]);
    }

    #[test]
    fn test_stops_when_reader_runs_dry() {
        let mut video = FakeVideo::new(10_000);
        video.readable_until_ms = 3_000;
        let mut ocr = ScriptedOcr::new(vec![vec!["01:00"], vec!["01:01"], vec!["01:02"]]);

        let (table, stats) = build_mapping(&mut video, &mut AlwaysLocate, &mut ocr, 1).unwrap();

        assert_eq!(table.len(), 3);
        assert!(stats.stopped_early);
        assert_eq!(stats.sampled, 3);
        assert_eq!(video.requested.last(), Some(&3_000));
    }

    #[test]
    fn test_read_error_ends_pass_and_keeps_entries() {
        let mut video = FakeVideo::new(10_000);
        video.broken_at_ms = Some(2_000);
        let mut ocr = ScriptedOcr::new(vec![vec!["05:00"], vec!["05:01"], vec!["05:02"]]);

        let (table, stats) = build_mapping(&mut video, &mut AlwaysLocate, &mut ocr, 1).unwrap();

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![("05:00", "00:00"), ("05:01", "00:01")]);
        assert!(stats.stopped_early);
        assert_eq!(stats.sampled, 2);
        assert_eq!(video.requested, vec![0, 1_000, 2_000]);
    }

    #[test]
    fn test_ocr_error_skips_only_that_frame() {
        let mut video = FakeVideo::new(4_000);
        let mut ocr = FailingOcr {
            inner: ScriptedOcr::new(vec![vec!["60:00"], vec!["60:02"], vec!["60:03"]]),
            fail_on: vec![1],
            calls: 0,
        };

        let (table, stats) = build_mapping(&mut video, &mut AlwaysLocate, &mut ocr, 1).unwrap();

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(
            entries,
            vec![("60:00", "00:00"), ("60:02", "00:02"), ("60:03", "00:03")]
        );
        assert_eq!(stats.sampled, 4);
        assert_eq!(stats.recorded, 3);
        assert_eq!(stats.skipped, 1);
        assert!(!stats.stopped_early);
    }

    #[test]
    fn test_detector_error_skips_only_that_frame() {
        let mut video = FakeVideo::new(4_000);
        let mut locator = FailingLocate { calls: 0 };
        let mut ocr = ScriptedOcr::new(vec![vec!["70:00"], vec!["70:02"]]);

        let (table, stats) = build_mapping(&mut video, &mut locator, &mut ocr, 1).unwrap();

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![("70:00", "00:00"), ("70:02", "00:02")]);
        assert_eq!(stats.recorded, 2);
        assert_eq!(stats.skipped, 2);
        assert!(!stats.stopped_early);
    }

    #[test]
    fn test_zero_step_is_rejected() {
        let mut video = FakeVideo::new(10_000);
        let mut ocr = ScriptedOcr::new(vec![]);
        assert!(build_mapping(&mut video, &mut AlwaysLocate, &mut ocr, 0).is_err());
    }
}
