use std::{fmt::Write, time::Duration};

/// Pretty-print the elapsed time of a span (used in progress bars)
pub fn elapsed_subsec(state: &indicatif::ProgressState, writer: &mut dyn Write) {
    let _ = writer.write_str(&format_subsec(state.elapsed()));
}

fn format_subsec(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let tenths = elapsed.subsec_millis() / 100;
    format!("{}.{}s", seconds, tenths)
}

/// Pretty-print a duration in its largest sensible unit (used in logs and diagnostics)
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs_f64();

    if duration < Duration::from_millis(1) {
        format!("{:.3}μs", duration.as_nanos() as f64 / 1_000.0)
    } else if duration < Duration::from_secs(1) {
        format!("{:.3}ms", duration.as_micros() as f64 / 1_000.0)
    } else if duration < Duration::from_secs(60) {
        format!("{:.3}s", seconds)
    } else if duration < Duration::from_secs(3_600) {
        format!("{:.3}m", seconds / 60.0)
    } else if duration < Duration::from_secs(86_400) {
        format!("{:.3}h", seconds / 3_600.0)
    } else {
        format!("{:.3}d", seconds / 86_400.0)
    }
}

#[cfg(test)]
mod time_tests {
    use super::*;

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(Duration::from_nanos(1_500)), "1.500μs");
        assert_eq!(format_duration(Duration::from_micros(2_250)), "2.250ms");
        assert_eq!(format_duration(Duration::from_millis(2_000)), "2.000s");
        assert_eq!(format_duration(Duration::from_secs(30)), "30.000s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.500m");
        assert_eq!(format_duration(Duration::from_secs(5_400)), "1.500h");
        assert_eq!(format_duration(Duration::from_secs(129_600)), "1.500d");
    }

    #[test]
    fn test_format_subsec() {
        assert_eq!(format_subsec(Duration::ZERO), "0.0s");
        assert_eq!(format_subsec(Duration::from_millis(2_345)), "2.3s");
    }
}
