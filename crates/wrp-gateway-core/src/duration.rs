//! Duration strings.
//!
//! Configuration expresses durations the way Go does: a sequence of decimal
//! numbers each followed by a unit, e.g. `500ms`, `5s`, `1m30s`, `2h`.
//! A bare `0` is accepted as zero.

use std::time::Duration;

use thiserror::Error;

/// Error type for duration parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    /// The string was empty.
    #[error("empty duration string")]
    Empty,

    /// A number could not be parsed.
    #[error("invalid number in duration: {0}")]
    InvalidNumber(String),

    /// A number was not followed by a unit.
    #[error("missing unit in duration: {0}")]
    MissingUnit(String),

    /// The unit is not one of `us`, `ms`, `s`, `m`, `h`.
    #[error("unknown unit in duration: {0}")]
    UnknownUnit(String),
}

/// Parse a Go-style duration string.
///
/// # Errors
///
/// Returns an error if the string is empty, a number is malformed, or a
/// unit is missing or unknown.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use wrp_gateway_core::parse_duration;
///
/// assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
/// assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| DurationParseError::MissingUnit(s.to_string()))?;
        if number_end == 0 {
            return Err(DurationParseError::InvalidNumber(s.to_string()));
        }
        let value: f64 = rest[..number_end]
            .parse()
            .map_err(|_| DurationParseError::InvalidNumber(rest[..number_end].to_string()))?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        let seconds = match unit {
            "us" | "µs" => value / 1_000_000.0,
            "ms" => value / 1_000.0,
            "s" => value,
            "m" => value * 60.0,
            "h" => value * 3_600.0,
            other => return Err(DurationParseError::UnknownUnit(other.to_string())),
        };
        total += Duration::from_secs_f64(seconds);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_duration("40s").unwrap(), Duration::from_secs(40));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("10ms").unwrap(), Duration::from_millis(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parses_compound_and_fractional() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(parse_duration(""), Err(DurationParseError::Empty));
        assert!(matches!(
            parse_duration("10"),
            Err(DurationParseError::MissingUnit(_))
        ));
        assert!(matches!(
            parse_duration("5d"),
            Err(DurationParseError::UnknownUnit(_))
        ));
        assert!(matches!(
            parse_duration("s"),
            Err(DurationParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_duration("1..2s"),
            Err(DurationParseError::InvalidNumber(_))
        ));
    }
}
