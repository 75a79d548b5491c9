// Nearest-match lookup of a match-clock query in a mapping table.

use crate::clock::{format_hms, Timecode};
use crate::mapping::MappingTable;
use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Table key that matched.
    pub key: String,
    pub clock: Timecode,
    /// Video offset recorded for the key, `MM:SS`.
    pub video_offset: String,
    pub distance_ms: u64,
}

impl Match {
    pub fn video_offset_ms(&self) -> Result<u64> {
        Ok(Timecode::parse(&self.video_offset)
            .with_context(|| format!("Invalid video offset {:?} in mappings", self.video_offset))?
            .millis)
    }
}

/// Keys made of digits once `:` and `+` are removed.
fn is_searchable_key(key: &str) -> bool {
    let mut digits = key.chars().filter(|c| *c != ':' && *c != '+').peekable();
    digits.peek().is_some() && digits.all(|c| c.is_ascii_digit())
}

/// Finds the table entry closest to `query`.
///
/// The nearest key wins; on equal distance the key recorded first wins.
/// Returns `None` when the nearest key is further than `margin_secs` away or
/// disagrees with the query on added time.
pub fn find_nearest(table: &MappingTable, query: &str, margin_secs: u64) -> Result<Option<Match>> {
    let target = Timecode::parse(query).with_context(|| format!("Invalid timestamp {:?}", query))?;

    let mut best: Option<(&str, Timecode, &str, u64)> = None;
    for (key, value) in table.iter().filter(|(k, _)| is_searchable_key(k)) {
        let Ok(clock) = Timecode::parse(key) else {
            tracing::debug!("Ignoring unparseable mapping key {:?}", key);
            continue;
        };
        let distance = clock.millis.abs_diff(target.millis);
        if best.map_or(true, |(_, _, _, d)| distance < d) {
            best = Some((key, clock, value, distance));
        }
    }

    let Some((key, clock, value, distance_ms)) = best else {
        tracing::info!("Mapping table has no usable entries");
        return Ok(None);
    };

    if distance_ms > margin_secs.saturating_mul(1000) || clock.added_time != target.added_time {
        tracing::info!(
            "Nearest reading {} is {} from {}{}",
            key,
            format_hms(distance_ms),
            query,
            if clock.added_time != target.added_time {
                " with a different added-time flag"
            } else {
                ""
            }
        );
        return Ok(None);
    }

    tracing::info!(
        "Found frame with timestamp {}, {} from desired timestamp",
        key,
        format_hms(distance_ms)
    );

    Ok(Some(Match {
        key: key.to_string(),
        clock,
        video_offset: value.to_string(),
        distance_ms,
    }))
}
