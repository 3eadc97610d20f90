//! Local substring filtering and name ordering
//!
//! The provider returns whole child lists, so narrowing by the typed text
//! happens here, identically for every language.

use crate::domain::ports::Suggestion;
use std::cmp::Ordering;

/// Keep suggestions whose name contains `query`, sorted by name
///
/// Matching is case-insensitive on the trimmed query; a blank query keeps
/// everything. `limit` truncates after sorting.
pub fn filter_and_sort(records: Vec<Suggestion>, query: &str, limit: Option<usize>) -> Vec<Suggestion> {
    let needle = query.trim().to_lowercase();

    let mut matched: Vec<(String, Suggestion)> = records
        .into_iter()
        .filter_map(|record| {
            let folded = record.name.to_lowercase();
            folded.contains(needle.as_str()).then_some((folded, record))
        })
        .collect();

    matched.sort_by(|(a_key, a), (b_key, b)| compare_names(a_key, &a.name, b_key, &b.name));

    let mut sorted: Vec<Suggestion> = matched.into_iter().map(|(_, record)| record).collect();
    if let Some(limit) = limit {
        sorted.truncate(limit);
    }
    sorted
}

fn compare_names(a_folded: &str, a_raw: &str, b_folded: &str, b_raw: &str) -> Ordering {
    a_folded.cmp(b_folded).then_with(|| a_raw.cmp(b_raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Vec<Suggestion> {
        vec![
            Suggestion::coded(3686110, "Colombia", "CO"),
            Suggestion::coded(3923057, "Bolivia", "BO"),
            Suggestion::coded(3469034, "Brazil", "BR"),
        ]
    }

    fn names(records: &[Suggestion]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_substring_match_sorted_by_name() {
        let result = filter_and_sort(fixture(), "ia", None);
        assert_eq!(names(&result), vec!["Bolivia", "Colombia"]);

        let result = filter_and_sort(fixture(), "bo", None);
        assert_eq!(names(&result), vec!["Bolivia"]);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let result = filter_and_sort(fixture(), "  BRA ", None);
        assert_eq!(names(&result), vec!["Brazil"]);
    }

    #[test]
    fn test_blank_query_keeps_all() {
        let result = filter_and_sort(fixture(), "", None);
        assert_eq!(names(&result), vec!["Bolivia", "Brazil", "Colombia"]);
    }

    #[test]
    fn test_limit_applies_after_sorting() {
        let result = filter_and_sort(fixture(), "", Some(2));
        assert_eq!(names(&result), vec!["Bolivia", "Brazil"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(filter_and_sort(fixture(), "xyz", Some(50)).is_empty());
    }

    #[test]
    fn test_accented_names() {
        let records = vec![
            Suggestion::named(2, "Medellín"),
            Suggestion::named(1, "Bogotá"),
            Suggestion::named(3, "bogotá"),
        ];
        let result = filter_and_sort(records, "BOGOTÁ", None);
        assert_eq!(names(&result), vec!["Bogotá", "bogotá"]);
    }
}
