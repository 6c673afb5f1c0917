//! Cache lifetime parsing and normalization

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// One year in milliseconds, the upper bound and default for cache lifetimes
pub const ONE_YEAR_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Error type for parsing a duration string
#[derive(Debug, Clone)]
pub struct ParseLifetimeError(String);

impl fmt::Display for ParseLifetimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid lifetime: {}", self.0)
    }
}

impl std::error::Error for ParseLifetimeError {}

/// A user-supplied cache lifetime
///
/// Deserializes from either a number of milliseconds (`max_age = 5000`)
/// or a shorthand duration string (`max_age = "30d"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LifetimeSpec {
    /// Milliseconds; fractional and negative values are accepted and normalized
    Millis(f64),
    /// `<number><unit>` with a short unit, e.g. `30d`, `12h`, `500ms`
    Text(String),
}

impl From<u64> for LifetimeSpec {
    fn from(ms: u64) -> Self {
        LifetimeSpec::Millis(ms as f64)
    }
}

impl From<i64> for LifetimeSpec {
    fn from(ms: i64) -> Self {
        LifetimeSpec::Millis(ms as f64)
    }
}

impl From<f64> for LifetimeSpec {
    fn from(ms: f64) -> Self {
        LifetimeSpec::Millis(ms)
    }
}

impl From<&str> for LifetimeSpec {
    fn from(text: &str) -> Self {
        LifetimeSpec::Text(text.to_string())
    }
}

impl From<String> for LifetimeSpec {
    fn from(text: String) -> Self {
        LifetimeSpec::Text(text)
    }
}

/// Time unit accepted in duration strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Year,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl TimeUnit {
    /// Milliseconds in one unit
    pub fn millis(&self) -> u64 {
        match self {
            TimeUnit::Year => 31_536_000_000,
            TimeUnit::Week => 604_800_000,
            TimeUnit::Day => 86_400_000,
            TimeUnit::Hour => 3_600_000,
            TimeUnit::Minute => 60_000,
            TimeUnit::Second => 1_000,
            TimeUnit::Millisecond => 1,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = ParseLifetimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "y" => Ok(TimeUnit::Year),
            "w" => Ok(TimeUnit::Week),
            "d" => Ok(TimeUnit::Day),
            "h" => Ok(TimeUnit::Hour),
            "m" => Ok(TimeUnit::Minute),
            "s" => Ok(TimeUnit::Second),
            "ms" => Ok(TimeUnit::Millisecond),
            _ => Err(ParseLifetimeError(s.to_string())),
        }
    }
}

/// Parse a duration string into milliseconds
///
/// Accepts `<digits>` (milliseconds) or `<digits><unit>` with a short unit
/// and nothing in between. Products too large for `u64` saturate; callers
/// clamp the result anyway.
pub fn parse_duration(text: &str) -> Result<u64, ParseLifetimeError> {
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit_text) = text.split_at(split);

    if digits.is_empty() {
        return Err(ParseLifetimeError(text.to_string()));
    }

    // Only overflow can fail here since `digits` is all ASCII digits
    let count = digits.parse::<u64>().unwrap_or(u64::MAX);

    if unit_text.is_empty() {
        return Ok(count);
    }

    if !unit_text.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ParseLifetimeError(text.to_string()));
    }

    let unit: TimeUnit = unit_text
        .parse()
        .map_err(|_| ParseLifetimeError(text.to_string()))?;

    Ok(count.saturating_mul(unit.millis()))
}

/// Resolve a lifetime to milliseconds in `[0, ONE_YEAR_MS]`
///
/// Absent or unparseable input yields `ONE_YEAR_MS`, never zero.
pub fn normalize(input: Option<&LifetimeSpec>) -> u64 {
    let resolved = match input {
        Some(LifetimeSpec::Millis(ms)) if ms.is_nan() => None,
        Some(LifetimeSpec::Millis(ms)) => {
            let floored = ms.floor();
            if floored < 0.0 {
                warn!("max-age {} ms is negative, using 0", ms);
                Some(0)
            } else if floored > ONE_YEAR_MS as f64 {
                Some(u64::MAX)
            } else {
                Some(floored as u64)
            }
        }
        Some(LifetimeSpec::Text(text)) => parse_duration(text).ok(),
        None => None,
    };

    match resolved {
        Some(ms) if ms > ONE_YEAR_MS => {
            warn!("max-age {:?} exceeds one year, using one year", input);
            ONE_YEAR_MS
        }
        Some(ms) => ms,
        None => ONE_YEAR_MS,
    }
}

/// Render a `Cache-Control` value for a lifetime in milliseconds
pub fn cache_control_value(max_age_ms: u64) -> String {
    format!("public, max-age={}", max_age_ms / 1000)
}
