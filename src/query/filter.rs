//! Query shaping for listing, pagination and stats endpoints.
//!
//! Raw query parameters arrive as an untyped key/value map. Listing
//! endpoints get a [`ListFilter`] where every surviving field is a
//! case-insensitive substring match (search-as-you-type); stats endpoints
//! get a [`StatsQuery`] of exact-equality matches plus a restricted
//! projection (deterministic grouping keys). The repo layer renders both
//! into parameterized SQL against a column allow-list.

use std::collections::BTreeMap;

use crate::query::dates::{end_of_day, start_of_day};

/// Parameter keys that select a date range instead of matching a field
/// directly. `entryDate` is the legacy name for the designated range
/// field itself and is never matched on.
const DATE_RANGE_KEYS: [&str; 3] = ["startDate", "endDate", "entryDate"];

/// Parameter keys that drive pagination/routing, not filtering.
const PAGING_KEYS: [&str; 3] = ["dept", "page", "limit"];

/// Columns a stats projection always carries in addition to the matched
/// field names.
const STATS_PROJECTION_BASE: [&str; 3] = ["id", "category", "expires_on"];

/// How a single field is matched in a list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    /// Case-insensitive substring match (rendered as escaped `ILIKE`).
    Contains(String),
}

/// Inclusive bounds over the designated entry-date field, normalized to
/// full-day timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Shaped filter for listing endpoints. AND semantics across fields.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub fields: BTreeMap<String, FieldMatch>,
    pub date_range: DateRange,
}

impl ListFilter {
    pub fn from_params(params: &BTreeMap<String, String>) -> Self {
        let mut filter = ListFilter::default();
        for (key, value) in params {
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "startDate" => {
                    filter.date_range.start = Some(start_of_day(value));
                }
                "endDate" => {
                    filter.date_range.end = Some(end_of_day(value));
                }
                k if DATE_RANGE_KEYS.contains(&k) => {}
                k if PAGING_KEYS.contains(&k) => {}
                _ => {
                    filter
                        .fields
                        .insert(key.clone(), FieldMatch::Contains(value.clone()));
                }
            }
        }
        filter
    }
}

/// Shaped query for stats/report endpoints: exact-match stage plus a
/// projection restricting which columns come back.
#[derive(Debug, Clone, Default)]
pub struct StatsQuery {
    pub matches: BTreeMap<String, String>,
    pub projection: Vec<String>,
}

impl StatsQuery {
    pub fn from_params(params: &BTreeMap<String, String>) -> Self {
        let mut matches = BTreeMap::new();
        for (key, value) in params {
            if value.is_empty() || PAGING_KEYS.contains(&key.as_str()) {
                continue;
            }
            matches.insert(key.clone(), value.clone());
        }
        let mut projection: Vec<String> =
            STATS_PROJECTION_BASE.iter().map(|c| c.to_string()).collect();
        for key in matches.keys() {
            if !projection.contains(key) {
                projection.push(key.clone());
            }
        }
        StatsQuery { matches, projection }
    }
}

/// Skip/limit pair for a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

/// `current_page` defaults to 1 when absent. No upper bound is enforced
/// on `page_size`; callers can request arbitrarily large pages (kept
/// as-is from the source, see DESIGN.md).
pub fn paginate(current_page: Option<i64>, page_size: i64) -> Page {
    let page = current_page.unwrap_or(1);
    Page {
        skip: (page - 1).max(0) * page_size,
        limit: page_size,
    }
}

/// Escapes `%`, `_` and `\` so user input matches literally inside an
/// `ILIKE '%...%'` pattern.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn list_filter_drops_date_keys_and_empty_values() {
        let filter = ListFilter::from_params(&params(&[
            ("name", "John"),
            ("department", "HR"),
            ("startDate", "2025-01-01"),
            ("endDate", "2025-02-01"),
            ("entryDate", ""),
        ]));

        assert!(!filter.fields.contains_key("startDate"));
        assert!(!filter.fields.contains_key("endDate"));
        assert!(!filter.fields.contains_key("entryDate"));
        assert_eq!(
            filter.fields.get("name"),
            Some(&FieldMatch::Contains("John".into()))
        );
        assert_eq!(
            filter.fields.get("department"),
            Some(&FieldMatch::Contains("HR".into()))
        );
    }

    #[test]
    fn list_filter_normalizes_date_bounds() {
        let filter = ListFilter::from_params(&params(&[
            ("startDate", "2025-01-01"),
            ("endDate", "2025-02-01"),
        ]));
        assert_eq!(
            filter.date_range.start.as_deref(),
            Some("2025-01-01T00:00:00.000Z")
        );
        assert_eq!(
            filter.date_range.end.as_deref(),
            Some("2025-02-01T23:59:00.000Z")
        );
    }

    #[test]
    fn list_filter_ignores_entry_date_even_when_set() {
        let filter = ListFilter::from_params(&params(&[("entryDate", "2025-01-01")]));
        assert!(filter.fields.is_empty());
        assert!(filter.date_range.is_empty());
    }

    #[test]
    fn stats_query_drops_paging_keys_and_matches_exactly() {
        let stats = StatsQuery::from_params(&params(&[
            ("dept", "IT"),
            ("page", "2"),
            ("limit", "5"),
            ("checkItem", "CPU"),
            ("result", "Pass"),
        ]));

        assert_eq!(
            stats.matches,
            params(&[("checkItem", "CPU"), ("result", "Pass")])
        );
        assert!(stats.projection.contains(&"id".to_string()));
        assert!(stats.projection.contains(&"checkItem".to_string()));
        assert!(stats.projection.contains(&"result".to_string()));
        assert!(!stats.matches.contains_key("dept"));
    }

    #[test]
    fn stats_projection_starts_from_fixed_allow_list() {
        let stats = StatsQuery::from_params(&BTreeMap::new());
        assert_eq!(
            stats.projection,
            vec![
                "id".to_string(),
                "category".to_string(),
                "expires_on".to_string()
            ]
        );
    }

    #[test]
    fn paginate_applies_skip_and_limit() {
        assert_eq!(paginate(Some(2), 10), Page { skip: 10, limit: 10 });
    }

    #[test]
    fn paginate_defaults_to_first_page() {
        assert_eq!(paginate(None, 5), Page { skip: 0, limit: 5 });
    }

    #[test]
    fn paginate_clamps_negative_page() {
        assert_eq!(paginate(Some(0), 5), Page { skip: 0, limit: 5 });
        assert_eq!(paginate(Some(-3), 5), Page { skip: 0, limit: 5 });
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\now"), "50\\%\\_off\\\\now");
        assert_eq!(escape_like("plain"), "plain");
    }
}
