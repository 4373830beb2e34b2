//! Split a segment store into base names and numbered duplicate names.
//!
//! A duplicate is a host-application segment whose name ends in one or more
//! `-<digits>` groups (`crm-1`, `crm-12`, `crm-1-2`). Its candidate base name
//! is the name with that whole trailing span removed, so a base name never
//! ends in a numeric suffix itself.

use crate::model::Segment;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

static DUPLICATE_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:-[0-9]+)+$").ok());

/// Split `name` into `(base, suffix)` when it carries a duplicate suffix.
///
/// Returns `None` for names without a suffix and for names that are nothing
/// but a suffix (`-3`).
#[must_use]
pub fn split_duplicate(name: &str) -> Option<(&str, &str)> {
    let found = DUPLICATE_SUFFIX.as_ref()?.find(name)?;
    let base = &name[..found.start()];
    if base.is_empty() {
        return None;
    }
    Some((base, found.as_str()))
}

/// Candidate base name for a duplicate, or `None` if `name` is not one.
#[must_use]
pub fn base_name_of(name: &str) -> Option<&str> {
    split_duplicate(name).map(|(base, _)| base)
}

/// Set of base names chosen by the user to restrict processing.
///
/// An empty filter admits every base name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NameFilter {
    search: String,
    names: BTreeSet<String>,
}

impl NameFilter {
    /// The unrestricted filter.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a filter from a case-sensitive substring search over `base_names`.
    ///
    /// A blank search yields the unrestricted filter. Returns `None` when the
    /// search matches no base name so the caller can report "no matches".
    #[must_use]
    pub fn from_search(search: &str, base_names: &BTreeSet<String>) -> Option<Self> {
        if search.is_empty() {
            return Some(Self::none());
        }

        let names: BTreeSet<String> = base_names
            .iter()
            .filter(|name| name.contains(search))
            .cloned()
            .collect();

        if names.is_empty() {
            debug!(search, "filter matched no base names");
            return None;
        }

        Some(Self {
            search: search.to_string(),
            names,
        })
    }

    /// Build a filter from an explicit list of base names.
    #[cfg(test)]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            search: String::new(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The search text the filter was built from (empty for no filter).
    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    #[must_use]
    pub const fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    #[must_use]
    pub fn admits(&self, base_name: &str) -> bool {
        self.names.is_empty() || self.names.contains(base_name)
    }
}

/// Base and duplicate names for one cycle, both sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub base_names: BTreeSet<String>,
    pub duplicate_names: BTreeSet<String>,
}

impl Classification {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.duplicate_names.is_empty()
    }

    /// Duplicate names whose candidate base is `base_name`, in sorted order.
    pub fn duplicates_of<'a>(&'a self, base_name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.duplicate_names
            .iter()
            .map(String::as_str)
            .filter(move |name| base_name_of(name) == Some(base_name))
    }
}

/// Classify `segments` into base and duplicate names.
///
/// Only host-application segments are considered. When `filter` is not empty
/// only duplicates whose candidate base is in the filter are kept.
#[must_use]
pub fn classify(segments: &[Segment], filter: &NameFilter) -> Classification {
    let mut classification = Classification::default();

    for segment in segments.iter().filter(|s| s.is_host_app()) {
        let Some(base) = base_name_of(&segment.name) else {
            continue;
        };
        if !filter.admits(base) {
            continue;
        }
        classification.duplicate_names.insert(segment.name.clone());
        classification.base_names.insert(base.to_string());
    }

    debug!(
        bases = classification.base_names.len(),
        duplicates = classification.duplicate_names.len(),
        "classified segment store"
    );
    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SegmentType;

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn split_strips_the_whole_numeric_suffix() {
        assert_eq!(split_duplicate("crm-1"), Some(("crm", "-1")));
        assert_eq!(split_duplicate("crm-10"), Some(("crm", "-10")));
        assert_eq!(split_duplicate("crm-1-2"), Some(("crm", "-1-2")));
        assert_eq!(split_duplicate("web-01-prod-3"), Some(("web-01-prod", "-3")));
    }

    #[test]
    fn split_rejects_non_duplicates() {
        assert_eq!(split_duplicate("crm"), None);
        assert_eq!(split_duplicate("crm-"), None);
        assert_eq!(split_duplicate("crm-a1"), None);
        assert_eq!(split_duplicate("web-01-prod"), None);
        assert_eq!(split_duplicate("-3"), None);
    }

    #[test]
    fn non_ascii_digits_are_not_suffixes() {
        assert_eq!(split_duplicate("crm-\u{0663}"), None);
    }

    #[test]
    fn classify_finds_bases_and_duplicates() {
        let segments = vec![
            Segment::host_app("1", "A"),
            Segment::host_app("2", "A-2"),
            Segment::host_app("3", "A-1"),
            Segment::host_app("4", "B"),
        ];
        let c = classify(&segments, &NameFilter::none());
        assert_eq!(names(&c.base_names), vec!["A"]);
        assert_eq!(names(&c.duplicate_names), vec!["A-1", "A-2"]);
        assert!(!c.is_empty());
    }

    #[test]
    fn classify_ignores_other_segment_types() {
        let segments = vec![
            Segment::new("1", "net-1", SegmentType::Other("IP_RANGE".into())),
            Segment::host_app("2", "crm-1"),
        ];
        let c = classify(&segments, &NameFilter::none());
        assert_eq!(names(&c.base_names), vec!["crm"]);
        assert_eq!(names(&c.duplicate_names), vec!["crm-1"]);
    }

    #[test]
    fn classify_handles_multi_digit_suffixes() {
        let segments = vec![
            Segment::host_app("1", "A"),
            Segment::host_app("2", "A-10"),
            Segment::host_app("3", "A-9"),
        ];
        let c = classify(&segments, &NameFilter::none());
        assert_eq!(names(&c.base_names), vec!["A"]);
        assert_eq!(names(&c.duplicate_names), vec!["A-10", "A-9"]);
    }

    #[test]
    fn classify_empty_store_is_empty() {
        let c = classify(&[], &NameFilter::none());
        assert!(c.is_empty());
        assert!(c.base_names.is_empty());
    }

    #[test]
    fn filter_restricts_to_matching_bases() {
        let segments = vec![
            Segment::host_app("1", "crm-1"),
            Segment::host_app("2", "erp-1"),
            Segment::host_app("3", "erp-test-2"),
        ];
        let all = classify(&segments, &NameFilter::none());
        let filter = NameFilter::from_search("erp", &all.base_names).expect("matches");
        assert_eq!(filter.search(), "erp");

        let c = classify(&segments, &filter);
        assert_eq!(names(&c.base_names), vec!["erp", "erp-test"]);
        assert_eq!(names(&c.duplicate_names), vec!["erp-1", "erp-test-2"]);
    }

    #[test]
    fn filter_with_no_match_is_reported() {
        let bases: BTreeSet<String> = ["crm".to_string()].into();
        assert!(NameFilter::from_search("CRM", &bases).is_none());
        assert_eq!(NameFilter::from_search("", &bases), Some(NameFilter::none()));
    }

    #[test]
    fn explicit_name_filter_admits_only_listed() {
        let filter = NameFilter::from_names(["a"]);
        assert!(filter.admits("a"));
        assert!(!filter.admits("b"));
        assert!(NameFilter::none().admits("b"));
    }

    #[test]
    fn duplicates_of_groups_by_base() {
        let segments = vec![
            Segment::host_app("1", "a-1"),
            Segment::host_app("2", "a-2"),
            Segment::host_app("3", "ab-1"),
        ];
        let c = classify(&segments, &NameFilter::none());
        assert_eq!(c.duplicates_of("a").collect::<Vec<_>>(), vec!["a-1", "a-2"]);
        assert_eq!(c.duplicates_of("ab").collect::<Vec<_>>(), vec!["ab-1"]);
    }
}
