// Clock extraction from OCR fragments.

use crate::clock::SEPARATORS;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"1?\d{1,2}[:;.|][0-5]\d?").expect("clock regex"));

/// Primary readings that mean the overlay shows a frozen half-time clock with
/// a separate added-time counter next to it.
const REGULATION_BOUNDARIES: [&str; 4] = ["45", "90", "45:00", "90:00"];

/// Why a frame produced no mapping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoScoreboard,
    NoText,
    NoClock,
    /// Added time was flagged on a regulation boundary but the counter was not read.
    MissingAddedTime,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NoScoreboard => "no scoreboard detected",
            SkipReason::NoText => "no text read",
            SkipReason::NoClock => "no clock reading",
            SkipReason::MissingAddedTime => "added-time counter missing",
        };
        f.write_str(s)
    }
}

/// Clock readings found on one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReading {
    /// Normalised `m:ss` readings in fragment order.
    pub timestamps: Vec<String>,
    pub added_time: bool,
}

impl FrameReading {
    pub fn from_fragments<S: AsRef<str>>(fragments: &[S]) -> Self {
        let added_time = fragments.iter().any(|f| {
            let f = f.as_ref().trim();
            f.starts_with('+') || f.ends_with('+')
        });

        let timestamps = fragments
            .iter()
            .filter_map(|f| CLOCK_RE.find(f.as_ref()))
            .map(|m| m.as_str().replace(&SEPARATORS[..], ":"))
            .collect();

        Self {
            timestamps,
            added_time,
        }
    }

    /// Builds the mapping key for this frame.
    ///
    /// The lexically greatest reading is the primary clock. When added time is
    /// flagged and the primary clock sits on 45 or 90 minutes, the next reading
    /// is the added-time counter and is summed onto it.
    pub fn canonical_key(&self) -> Result<String, SkipReason> {
        let mut sorted = self.timestamps.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));

        let primary = sorted.first().ok_or(SkipReason::NoClock)?;
        if !(self.added_time && REGULATION_BOUNDARIES.contains(&primary.as_str())) {
            return Ok(primary.clone());
        }

        let counter = sorted.get(1).ok_or(SkipReason::MissingAddedTime)?;
        let (minutes, seconds) = split_fields(primary).ok_or(SkipReason::NoClock)?;
        let (added_minutes, added_seconds) =
            split_fields(counter).ok_or(SkipReason::MissingAddedTime)?;

        let total_seconds = seconds + added_seconds;
        let total_minutes = minutes + added_minutes + total_seconds / 60;
        Ok(format!("{:02}:{:02}+", total_minutes, total_seconds % 60))
    }
}

/// Splits `m[:s]` into minutes and seconds; a bare number counts as minutes.
fn split_fields(reading: &str) -> Option<(u64, u64)> {
    let mut parts = reading.split(':');
    let minutes = parts.next()?.parse().ok()?;
    let seconds = match parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((minutes, seconds))
}
