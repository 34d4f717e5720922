use crate::error::EngineError;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted window: 100 years of 365.25 days.
pub const MAX_WINDOW_SECONDS: i64 = 36_525 * 86_400;

/// A window length written as `<integer><unit>` (`30m`, `6h`, `7d`).
///
/// The caller's spelling is kept as the label so results can be keyed by the
/// exact string that was requested (`"24h"` stays `"24h"`, it is never
/// renormalised to `"1d"`). Units are `s`, `m`, `h`, `d` and `w`; anything else
/// falls back to hours.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WindowDuration {
    label: String,
    seconds: i64,
}

impl WindowDuration {
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let trimmed = raw.trim();
        let digits_end = trimmed
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(idx, _)| idx)
            .unwrap_or(trimmed.len());
        if digits_end == 0 {
            return Err(EngineError::validation(format!(
                "invalid duration {raw:?}: expected <integer><unit>"
            )));
        }
        let amount: i64 = trimmed[..digits_end].parse().map_err(|_| {
            EngineError::validation(format!("invalid duration {raw:?}: amount out of range"))
        })?;
        let unit_seconds = match trimmed[digits_end..].trim() {
            "s" => 1,
            "m" => 60,
            "h" => 3_600,
            "d" => 86_400,
            "w" => 7 * 86_400,
            _ => 3_600,
        };
        let seconds = amount
            .checked_mul(unit_seconds)
            .filter(|seconds| *seconds <= MAX_WINDOW_SECONDS)
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "invalid duration {raw:?}: longer than {MAX_WINDOW_SECONDS} seconds"
                ))
            })?;
        Ok(Self {
            label: trimmed.to_string(),
            seconds,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }

    /// `ts - self`, clamped to the earliest representable instant.
    pub fn before(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        ts.checked_sub_signed(self.as_duration())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// `ts + self`, clamped to the latest representable instant.
    pub fn after(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        ts.checked_add_signed(self.as_duration())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Number of samples this window spans at the given sampling interval (at least 1).
    pub fn to_samples(&self, interval_seconds: i64) -> usize {
        let interval = interval_seconds.max(1) as f64;
        ((self.seconds as f64) / interval).round().max(1.0) as usize
    }

    pub fn ensure_positive(&self, name: &str) -> Result<(), EngineError> {
        if self.seconds <= 0 {
            return Err(EngineError::validation(format!(
                "{name} must be a positive duration (got {:?})",
                self.label
            )));
        }
        Ok(())
    }
}

impl TryFrom<String> for WindowDuration {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WindowDuration> for String {
    fn from(value: WindowDuration) -> Self {
        value.label
    }
}

impl fmt::Display for WindowDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

pub fn hour_of_day(ts: DateTime<Utc>) -> u32 {
    ts.hour()
}

/// Day of week with Sunday as 0.
pub fn day_of_week(ts: DateTime<Utc>) -> u32 {
    ts.weekday().num_days_from_sunday()
}

pub fn iso_week(ts: DateTime<Utc>) -> u32 {
    ts.iso_week().week()
}

/// Median spacing between consecutive distinct timestamps, in seconds.
///
/// Falls back to one hour when fewer than two distinct timestamps exist.
pub fn median_interval_seconds(timestamps: &[DateTime<Utc>]) -> i64 {
    const FALLBACK_SECONDS: i64 = 3_600;
    let mut deltas: Vec<i64> = timestamps
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_seconds())
        .filter(|delta| *delta > 0)
        .collect();
    if deltas.is_empty() {
        return FALLBACK_SECONDS;
    }
    deltas.sort_unstable();
    deltas[deltas.len() / 2]
}
