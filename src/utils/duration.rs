//! Parsing of human-friendly duration strings such as `10m` or `1h30m`.

use std::time::Duration;

use crate::error::ConfigError;

/// Parse a duration string like "500ms", "30s", "10m", "1h30m" or "1.5h".
///
/// Every number needs a unit (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`).
/// Zero and negative durations are rejected since a solution budget of
/// nothing would fail every solution.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(raw.to_string());

    let s = raw.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    if s.is_empty() || s.starts_with('-') {
        return Err(invalid());
    }

    let mut total_nanos: f64 = 0.0;
    let mut chars = s.chars().peekable();
    let mut num_buf = String::new();
    let mut unit = String::new();

    while chars.peek().is_some() {
        num_buf.clear();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                num_buf.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if num_buf.is_empty() || num_buf == "." {
            return Err(invalid());
        }
        let num: f64 = num_buf.parse().map_err(|_| invalid())?;

        unit.clear();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                break;
            }
            unit.push(c);
            chars.next();
        }

        let scale = match unit.as_str() {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1_000.0,
            "ms" => 1_000_000.0,
            "s" => 1_000_000_000.0,
            "m" => 60.0 * 1_000_000_000.0,
            "h" => 3_600.0 * 1_000_000_000.0,
            _ => return Err(invalid()),
        };
        total_nanos += num * scale;
    }

    if !total_nanos.is_finite() || total_nanos < 1.0 || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total_nanos as u64))
}
