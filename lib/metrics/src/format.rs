//! Human-readable formatting for the presentation layer.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Formats a byte count with binary (1024) scaling.
///
/// Plain bytes print without decimals, every larger unit with one:
///
/// ```
/// use metrics::format::format_bytes;
///
/// assert_eq!(format_bytes(0), "0 B");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;

    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Formats a throughput in bytes per second, e.g. `"122.5 KB/s"`.
pub fn format_rate(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

/// Formats a ratio in `[0, 1]` as a whole percentage, right-aligned to two digits.
pub fn format_percent(ratio: f64) -> String {
    format!("{:>2.0}%", ratio.clamp(0.0, 1.0) * 100.0)
}

#[cfg(test)]
mod format_tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1_048_576), "1.0 MB");
        assert_eq!(format_bytes(1_073_741_824), "1.0 GB");
        assert_eq!(format_bytes(1_099_511_627_776), "1.0 TB");
    }

    #[test]
    fn test_format_bytes_fractional() {
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(17_179_869_184), "16.0 GB");
        assert_eq!(format_bytes(412_316_860_416), "384.0 GB");
    }

    #[test]
    fn test_format_bytes_caps_at_terabytes() {
        assert_eq!(format_bytes(1_125_899_906_842_624), "1024.0 TB");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0), "0 B/s");
        assert_eq!(format_rate(250), "250 B/s");
        assert_eq!(format_rate(125_440), "122.5 KB/s");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.0), " 0%");
        assert_eq!(format_percent(0.42), "42%");
        assert_eq!(format_percent(1.0), "100%");
        assert_eq!(format_percent(1.7), "100%");
    }
}
