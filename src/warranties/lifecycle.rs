//! Coverage-window arithmetic for progress display.
//!
//! Both functions take `now` explicitly so callers (and tests) control
//! the clock; nothing here reads the system time.

use time::{Date, OffsetDateTime};

const SECS_PER_DAY: i64 = 86_400;

/// Whole days of coverage remaining, rounded up, floored at zero for
/// already-expired warranties.
pub fn days_left(expires_on: Date, now: OffsetDateTime) -> i64 {
    let expires = expires_on.midnight().assume_utc();
    let secs = (expires - now).whole_seconds();
    if secs <= 0 {
        return 0;
    }
    (secs + SECS_PER_DAY - 1) / SECS_PER_DAY
}

/// Elapsed fraction of the coverage window, 0..=100.
///
/// A degenerate window (`expires_on <= purchased_on`) reads as fully
/// elapsed rather than dividing by zero.
pub fn percentage(purchased_on: Date, expires_on: Date, now: OffsetDateTime) -> u8 {
    let start = purchased_on.midnight().assume_utc();
    let end = expires_on.midnight().assume_utc();
    if end <= start {
        return 100;
    }
    let total = (end - start).whole_seconds() as f64;
    let elapsed = (now - start).whole_seconds() as f64;
    (100.0 * elapsed / total).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn days_left_counts_whole_days_rounding_up() {
        let now = datetime!(2025-01-01 12:00:00 UTC);
        // Half a day left still counts as one day.
        assert_eq!(days_left(date!(2025 - 01 - 02), now), 1);
        assert_eq!(days_left(date!(2025 - 01 - 11), now), 10);
    }

    #[test]
    fn days_left_is_zero_at_expiry_instant() {
        let now = datetime!(2025-06-01 00:00:00 UTC);
        assert_eq!(days_left(date!(2025 - 06 - 01), now), 0);
    }

    #[test]
    fn days_left_never_goes_negative() {
        let now = datetime!(2025-06-01 00:00:00 UTC);
        assert_eq!(days_left(date!(2020 - 01 - 01), now), 0);
    }

    #[test]
    fn percentage_halfway_through_window() {
        let now = datetime!(2025-07-02 00:00:00 UTC);
        assert_eq!(
            percentage(date!(2025 - 01 - 01), date!(2025 - 12 - 31), now),
            50
        );
    }

    #[test]
    fn percentage_clamps_before_and_after_window() {
        assert_eq!(
            percentage(
                date!(2025 - 06 - 01),
                date!(2026 - 06 - 01),
                datetime!(2025-01-01 00:00:00 UTC)
            ),
            0
        );
        assert_eq!(
            percentage(
                date!(2020 - 01 - 01),
                date!(2021 - 01 - 01),
                datetime!(2025-01-01 00:00:00 UTC)
            ),
            100
        );
    }

    #[test]
    fn percentage_degenerate_window_is_fully_elapsed() {
        // Same-day purchase and expiry must not divide by zero.
        let now = datetime!(2025-03-03 09:00:00 UTC);
        assert_eq!(
            percentage(date!(2025 - 03 - 03), date!(2025 - 03 - 03), now),
            100
        );
    }
}
