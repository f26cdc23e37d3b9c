//! Parsers turning raw RouterOS property strings into metric values.

use std::fmt;

/// A raw value that could not be turned into a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueError {
    pub raw: String,
    pub reason: String,
}

impl ValueError {
    pub fn new(raw: &str, reason: impl Into<String>) -> Self {
        Self {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse '{}': {}", self.raw, self.reason)
    }
}

impl std::error::Error for ValueError {}

/// Signature shared by all value parsers.
pub type ValueParser = fn(&str) -> Result<f64, ValueError>;

/// Plain 64-bit float.
pub fn parse_float(raw: &str) -> Result<f64, ValueError> {
    raw.parse::<f64>()
        .map_err(|e| ValueError::new(raw, e.to_string()))
}

/// RouterOS durations such as `1w2d3h4m5s`, in seconds.
///
/// Also accepts a trailing clock part as printed by newer firmware
/// (`3d04:05:06`, `00:10:00`).
pub fn parse_uptime(raw: &str) -> Result<f64, ValueError> {
    if raw.is_empty() {
        return Err(ValueError::new(raw, "empty duration"));
    }

    let mut total: u64 = 0;
    let mut rest = raw;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(ValueError::new(raw, "expected a number"));
        }
        let (number, tail) = rest.split_at(digits);

        if tail.starts_with(':') {
            let clock =
                parse_clock(rest).ok_or_else(|| ValueError::new(raw, "invalid hh:mm:ss part"))?;
            total = total
                .checked_add(clock)
                .ok_or_else(|| ValueError::new(raw, "duration overflow"))?;
            break;
        }

        let value: u64 = number
            .parse()
            .map_err(|_| ValueError::new(raw, "number out of range"))?;
        let mut chars = tail.chars();
        let unit: u64 = match chars.next() {
            Some('w') => 7 * 24 * 3600,
            Some('d') => 24 * 3600,
            Some('h') => 3600,
            Some('m') => 60,
            Some('s') => 1,
            Some(c) => return Err(ValueError::new(raw, format!("unknown unit '{}'", c))),
            None => return Err(ValueError::new(raw, "missing unit")),
        };
        total = value
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| ValueError::new(raw, "duration overflow"))?;
        rest = chars.as_str();
    }

    Ok(total as f64)
}

fn parse_clock(clock: &str) -> Option<u64> {
    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)
}

/// `true`/`yes` → 1, `false`/`no` → 0.
pub fn parse_bool(raw: &str) -> Result<f64, ValueError> {
    match raw {
        "true" | "yes" => Ok(1.0),
        "false" | "no" => Ok(0.0),
        _ => Err(ValueError::new(raw, "expected true/false")),
    }
}

/// Link rates such as `100Mbps` or `2.5Gbps`, in bits per second.
pub fn parse_rate(raw: &str) -> Result<f64, ValueError> {
    let (number, multiplier) = if let Some(n) = raw.strip_suffix("Gbps") {
        (n, 1e9)
    } else if let Some(n) = raw.strip_suffix("Mbps") {
        (n, 1e6)
    } else if let Some(n) = raw.strip_suffix("kbps") {
        (n, 1e3)
    } else if let Some(n) = raw.strip_suffix("bps") {
        (n, 1.0)
    } else {
        return Err(ValueError::new(raw, "unknown rate unit"));
    };

    number
        .parse::<f64>()
        .map(|n| n * multiplier)
        .map_err(|e| ValueError::new(raw, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_float_accepts_numbers_and_rejects_text() {
        assert_eq!(parse_float("1000").unwrap(), 1000.0);
        assert_eq!(parse_float("50.5").unwrap(), 50.5);
        let err = parse_float("abc").unwrap_err();
        assert_eq!(err.raw, "abc");
        assert!(err.to_string().starts_with("cannot parse 'abc'"));
    }

    #[test]
    fn parse_float_does_not_trim() {
        assert!(parse_float(" 12").is_err());
    }

    #[test]
    fn parse_uptime_unit_form() {
        assert_eq!(parse_uptime("5s").unwrap(), 5.0);
        assert_eq!(parse_uptime("4m5s").unwrap(), 245.0);
        assert_eq!(
            parse_uptime("1w2d3h4m5s").unwrap(),
            (604_800 + 2 * 86_400 + 3 * 3_600 + 4 * 60 + 5) as f64
        );
    }

    #[test]
    fn parse_uptime_clock_form() {
        assert_eq!(parse_uptime("00:10:00").unwrap(), 600.0);
        assert_eq!(
            parse_uptime("3d04:05:06").unwrap(),
            (3 * 86_400 + 4 * 3_600 + 5 * 60 + 6) as f64
        );
    }

    #[test]
    fn parse_uptime_rejects_garbage() {
        assert!(parse_uptime("").is_err());
        assert!(parse_uptime("abc").is_err());
        assert!(parse_uptime("12").is_err());
        assert!(parse_uptime("3x").is_err());
        assert!(parse_uptime("1d04:75:00").is_err());
        assert!(parse_uptime("99999999999999999999w").is_err());
    }

    #[test]
    fn parse_uptime_rejects_clock_overflow() {
        let err = parse_uptime("99999999999999999:00:00").unwrap_err();
        assert_eq!(err.reason, "invalid hh:mm:ss part");
        assert!(parse_uptime("1d99999999999999999:00:00").is_err());
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true").unwrap(), 1.0);
        assert_eq!(parse_bool("yes").unwrap(), 1.0);
        assert_eq!(parse_bool("false").unwrap(), 0.0);
        assert_eq!(parse_bool("no").unwrap(), 0.0);
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn parse_rate_units() {
        assert_eq!(parse_rate("10Mbps").unwrap(), 10e6);
        assert_eq!(parse_rate("1Gbps").unwrap(), 1e9);
        assert_eq!(parse_rate("2.5Gbps").unwrap(), 2.5e9);
        assert!(parse_rate("fast").is_err());
        assert!(parse_rate("xGbps").is_err());
    }
}
