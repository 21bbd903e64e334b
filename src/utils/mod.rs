//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;

use chrono::{DateTime, Utc};

/// Convert a wall-clock instant to Unix nanoseconds (UTC)
///
/// Instants before the epoch clamp to zero.
pub fn unix_nanos(at: DateTime<Utc>) -> u64 {
    at.timestamp_nanos_opt()
        .map(|nanos| nanos.max(0) as u64)
        .unwrap_or(0)
}

/// Current wall-clock time as Unix nanoseconds
pub fn now_nanos() -> u64 {
    unix_nanos(Utc::now())
}

/// Replace newlines with spaces and trim surrounding spaces and tabs
pub fn collapse_newlines(text: &str) -> String {
    text.replace('\n', " ")
        .trim_matches(|c| c == ' ' || c == '\t')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unix_nanos() {
        let at = Utc.with_ymd_and_hms(2021, 5, 1, 12, 0, 0).unwrap();
        let nanos = unix_nanos(at);
        assert_eq!(nanos, 1_619_870_400_000_000_000);
    }

    #[test]
    fn test_pre_epoch_clamps_to_zero() {
        let at = Utc.with_ymd_and_hms(1969, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(unix_nanos(at), 0);
    }

    #[test]
    fn test_collapse_newlines() {
        assert_eq!(collapse_newlines("\n  Deep\nLearning \t"), "Deep Learning");
        assert_eq!(collapse_newlines("plain"), "plain");
        assert_eq!(collapse_newlines(""), "");
    }
}
