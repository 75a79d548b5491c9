// Match-clock strings and millisecond offsets.
//
// Clock readings look like `mm:ss`, `m.ss`, `hh:mm:ss` and may carry a trailing
// `+` when the overlay is showing added time.

use anyhow::{anyhow, bail, Result};
use std::fmt;

const SECONDS_PER_DAY: u64 = 24 * 3600;

/// Field separators accepted when parsing a clock reading.
pub const SEPARATORS: [char; 4] = [':', '.', ';', '|'];

/// A parsed clock reading or video offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    pub millis: u64,
    pub added_time: bool,
}

impl Timecode {
    pub fn new(millis: u64, added_time: bool) -> Self {
        Self { millis, added_time }
    }

    /// Parses `[[hh:]mm:]ss[+]`. Fields are read right to left, each one
    /// worth sixty times the field to its right.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (body, added_time) = match text.strip_suffix('+') {
            Some(body) => (body, true),
            None => (text, false),
        };

        if body.is_empty() {
            bail!("Empty clock reading: {:?}", text);
        }

        let mut millis: u64 = 0;
        for (i, field) in body.rsplit(&SEPARATORS[..]).enumerate() {
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                bail!("Invalid clock field {:?} in {:?}", field, text);
            }
            let value: u64 = field.parse()?;
            let weight = 60u64
                .checked_pow(i as u32)
                .and_then(|w| w.checked_mul(1000))
                .ok_or_else(|| anyhow!("Clock reading has too many fields: {:?}", text))?;
            millis = value
                .checked_mul(weight)
                .and_then(|v| millis.checked_add(v))
                .ok_or_else(|| anyhow!("Clock reading out of range: {:?}", text))?;
        }

        Ok(Self::new(millis, added_time))
    }

    pub fn to_clock_string(&self) -> String {
        format_clock(self.millis, self.added_time)
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_clock_string())
    }
}

/// Formats milliseconds as `MM:SS`, wrapping at 24 hours.
pub fn format_clock(millis: u64, added_time: bool) -> String {
    let seconds = (millis / 1000) % SECONDS_PER_DAY;
    let suffix = if added_time { "+" } else { "" };
    format!("{:02}:{:02}{}", seconds / 60, seconds % 60, suffix)
}

/// Formats milliseconds as `HH:MM:SS`, wrapping at 24 hours.
pub fn format_hms(millis: u64) -> String {
    let seconds = (millis / 1000) % SECONDS_PER_DAY;
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
