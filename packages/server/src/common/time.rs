use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};

/// Parse a compact duration string like `"30d"`, `"1M"` or `"1h 30m"`.
///
/// Units: s, m, h, d, w, M (30 days), y (365 days). Multiple
/// space-separated parts are summed.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let mut total = Duration::zero();

    for part in input.split_whitespace() {
        let (value, unit) = part.split_at(part.len().saturating_sub(1));
        let value: i64 = value
            .parse()
            .map_err(|_| Error::Config(format!("invalid duration part: {part}")))?;

        let delta = match unit {
            "s" => Duration::seconds(value),
            "m" => Duration::minutes(value),
            "h" => Duration::hours(value),
            "d" => Duration::days(value),
            "w" => Duration::weeks(value),
            "M" => Duration::days(value * 30),
            "y" => Duration::days(value * 365),
            _ => return Err(Error::Config(format!("invalid duration unit: {part}"))),
        };

        total += delta;
    }

    Ok(total)
}

/// The instant `input` ago from now.
pub fn datetime_from_now(input: &str) -> Result<DateTime<Utc>> {
    Ok(Utc::now() - parse_duration(input)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::minutes(5));
        assert_eq!(parse_duration("24h").unwrap(), Duration::hours(24));
        assert_eq!(parse_duration("3d").unwrap(), Duration::days(3));
        assert_eq!(parse_duration("2w").unwrap(), Duration::weeks(2));
        assert_eq!(parse_duration("1M").unwrap(), Duration::days(30));
        assert_eq!(parse_duration("1y").unwrap(), Duration::days(365));
    }

    #[test]
    fn test_compound_duration() {
        assert_eq!(
            parse_duration("1h 30m").unwrap(),
            Duration::minutes(90)
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(parse_duration("30x").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("d").is_err());
    }
}
