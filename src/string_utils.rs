use std::fmt;

use anyhow::{bail, Result};

/// Parse a human size string: optional decimal value plus a unit out of
/// B, K/KB, M/MB, G/GB, T/TB, case-insensitive. A bare number is bytes.
pub fn parse_size(input: &str) -> Result<u64> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(input.len());
    let (value, unit) = input.split_at(split);
    if value.is_empty() {
        bail!("invalid size value: {}", input);
    }
    let value: f64 = value.parse()?;
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        "T" | "TB" => 1024u64.pow(4),
        other => bail!("invalid size unit: {}", other),
    };
    Ok((value * multiplier as f64).round() as u64)
}

pub fn size_to_str(size: u64) -> String {
    if size > 1024 * 1024 {
        format!("{} MiB ({} bytes)", size / (1024 * 1024), size)
    } else if size > 1024 {
        format!("{} KiB ({} bytes)", size / 1024, size)
    } else {
        format!("{} bytes", size)
    }
}

pub struct Ratio(pub u64, pub u64);

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.1 == 0 {
            write!(f, "n/a")
        } else {
            write!(f, "{:.2}:1", self.0 as f64 / self.1 as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bytes() {
        assert_eq!(parse_size("123").unwrap(), 123);
        assert_eq!(parse_size("123B").unwrap(), 123);
    }

    #[test]
    fn units_and_case() {
        assert_eq!(parse_size("64KB").unwrap(), 64 * 1024);
        assert_eq!(parse_size("64k").unwrap(), 64 * 1024);
        assert_eq!(parse_size("2mb").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("1GB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("1T").unwrap(), 1024u64.pow(4));
    }

    #[test]
    fn decimal_values() {
        assert_eq!(parse_size("1.5KB").unwrap(), 1536);
        assert_eq!(parse_size("0.5MB").unwrap(), 512 * 1024);
    }

    #[test]
    fn garbage_rejected() {
        assert!(parse_size("").is_err());
        assert!(parse_size("KB").is_err());
        assert!(parse_size("12XB").is_err());
    }
}
