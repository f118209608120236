//! Byte-count formatting and parsing for summaries, CSV output and CLI
//! arguments. Everything internal stays in `u64` bytes; floats only appear
//! at this boundary.

use thiserror::Error;

const UNITS: [(&str, u64); 4] = [("TB", 1 << 40), ("GB", 1 << 30), ("MB", 1 << 20), ("KB", 1 << 10)];

/// Format a byte count with binary units (1 KB = 1024 B).
///
/// Gigabytes and above get two decimals, smaller units one.
pub fn format_size(bytes: u64) -> String {
    for (label, scale) in UNITS {
        if bytes >= scale {
            let value = bytes as f64 / scale as f64;
            return if scale >= 1 << 30 {
                format!("{value:.2} {label}")
            } else {
                format!("{value:.1} {label}")
            };
        }
    }
    format!("{bytes} B")
}

/// Format a count with thousand separators.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeParseError {
    #[error("invalid size: {0:?}")]
    Number(String),
    #[error("unknown size unit: {0:?}")]
    Unit(String),
}

/// Parse "4096", "10KB", "1.5 GB" or "2m" into bytes, using binary units.
pub fn parse_size(input: &str) -> Result<u64, SizeParseError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| SizeParseError::Number(input.to_string()))?;

    let unit = unit.trim().to_ascii_uppercase();
    let scale = match unit.as_str() {
        "" | "B" => 1,
        _ => {
            let short = unit.trim_end_matches("IB").trim_end_matches('B');
            UNITS
                .iter()
                .find(|(label, _)| label.starts_with(short) && !short.is_empty())
                .map(|(_, scale)| *scale)
                .ok_or(SizeParseError::Unit(unit.clone()))?
        }
    };
    Ok((value * scale as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(10_000), "9.8 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
        assert_eq!(format_size(1_099_511_627_776), "1.00 TB");
    }

    #[test]
    fn count_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("10KB"), Ok(10 * 1024));
        assert_eq!(parse_size("2m"), Ok(2 << 20));
        assert_eq!(parse_size("3 MiB"), Ok(3 << 20));
        assert_eq!(parse_size("1.5 GB"), Ok(1_610_612_736));
        assert_eq!(parse_size("12 parsecs"), Err(SizeParseError::Unit("PARSECS".into())));
        assert!(matches!(parse_size("lots"), Err(SizeParseError::Number(_))));
    }
}
