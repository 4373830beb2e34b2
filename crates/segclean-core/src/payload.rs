//! Delete payload derivation.
//!
//! The update payload is the merge outcome itself; only deletes need their
//! own pass over the store. A duplicate is only deleted once its lists are
//! safely in a merged base.

use crate::classify::base_name_of;
use crate::merge::{IssueRole, MergeIssue};
use crate::model::Segment;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

/// A duplicate kept out of the delete payload because its lists were not merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeldBack {
    pub id: String,
    pub name: String,
    /// Base the record should have been folded into.
    pub base_name: String,
}

/// Ids to delete, plus the duplicates withheld from deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletePayload {
    pub ids: Vec<String>,
    /// Names of the records in `ids`.
    pub names: BTreeSet<String>,
    pub held_back: Vec<HeldBack>,
}

fn duplicate_records<'a>(
    duplicate_names: &'a BTreeSet<String>,
    segments: &'a [Segment],
) -> impl Iterator<Item = &'a Segment> + 'a {
    duplicate_names
        .iter()
        .flat_map(move |name| segments.iter().filter(move |segment| &segment.name == name))
}

/// Collect the ids of every segment whose name is in `duplicate_names`.
///
/// Order is `duplicate_names` order, then store order for segments sharing a
/// name. Base names never carry a duplicate suffix, so no true-base id can
/// appear here.
#[must_use]
pub fn build_delete_list(duplicate_names: &BTreeSet<String>, segments: &[Segment]) -> Vec<String> {
    duplicate_records(duplicate_names, segments)
        .map(|segment| segment.id.clone())
        .collect()
}

/// Delete list minus every duplicate whose data the merge did not keep.
///
/// A duplicate is held back when it was skipped as a malformed contributor,
/// or when the record of its own base was dropped as malformed. Ordering
/// matches [`build_delete_list`].
#[must_use]
pub fn build_delete_payload(
    duplicate_names: &BTreeSet<String>,
    segments: &[Segment],
    issues: &[MergeIssue],
) -> DeletePayload {
    let dropped_bases: BTreeSet<&str> = issues
        .iter()
        .filter(|issue| issue.role == IssueRole::Base)
        .map(|issue| issue.base_name.as_str())
        .collect();

    let mut payload = DeletePayload::default();
    for segment in duplicate_records(duplicate_names, segments) {
        let skipped = issues.iter().find(|issue| {
            issue.role == IssueRole::Contributor && issue.segment_id == segment.id
        });
        let own_base = base_name_of(&segment.name).unwrap_or(segment.name.as_str());
        let held_for = match skipped {
            Some(issue) => Some(issue.base_name.as_str()),
            None => dropped_bases.contains(own_base).then_some(own_base),
        };

        match held_for {
            Some(base_name) => {
                warn!(
                    id = %segment.id,
                    name = %segment.name,
                    base = base_name,
                    "holding back duplicate whose lists were not merged"
                );
                payload.held_back.push(HeldBack {
                    id: segment.id.clone(),
                    name: segment.name.clone(),
                    base_name: base_name.to_string(),
                });
            }
            None => {
                payload.ids.push(segment.id.clone());
                payload.names.insert(segment.name.clone());
            }
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ListField;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|n| (*n).to_string()).collect()
    }

    fn issue(id: &str, name: &str, base: &str, role: IssueRole) -> MergeIssue {
        MergeIssue {
            segment_id: id.into(),
            segment_name: name.into(),
            base_name: base.into(),
            role,
            missing: vec![ListField::Hosts],
        }
    }

    #[test]
    fn delete_list_follows_name_order_then_store_order() {
        let segments = vec![
            Segment::host_app("30", "A-2"),
            Segment::host_app("10", "A"),
            Segment::host_app("20", "A-1"),
            Segment::host_app("31", "A-2"),
        ];
        let dups = names(&["A-1", "A-2"]);
        assert_eq!(build_delete_list(&dups, &segments), vec!["20", "30", "31"]);
    }

    #[test]
    fn unknown_names_yield_nothing() {
        let segments = vec![Segment::host_app("1", "A")];
        assert!(build_delete_list(&names(&["A-9"]), &segments).is_empty());
        assert!(build_delete_list(&BTreeSet::new(), &segments).is_empty());
    }

    #[test]
    fn payload_without_issues_matches_the_plain_list() {
        let segments = vec![
            Segment::host_app("1", "A"),
            Segment::host_app("2", "A-1"),
            Segment::host_app("3", "B-1"),
        ];
        let dups = names(&["A-1", "B-1"]);
        let payload = build_delete_payload(&dups, &segments, &[]);
        assert_eq!(payload.ids, build_delete_list(&dups, &segments));
        assert_eq!(payload.names, dups);
        assert!(payload.held_back.is_empty());
    }

    #[test]
    fn skipped_contributor_is_held_back() {
        let segments = vec![
            Segment::host_app("1", "A"),
            Segment::host_app("2", "A-1"),
            Segment::host_app("3", "A-2"),
        ];
        let issues = [issue("2", "A-1", "A", IssueRole::Contributor)];
        let payload = build_delete_payload(&names(&["A-1", "A-2"]), &segments, &issues);

        assert_eq!(payload.ids, vec!["3"]);
        assert_eq!(payload.names, names(&["A-2"]));
        assert_eq!(
            payload.held_back,
            vec![HeldBack {
                id: "2".into(),
                name: "A-1".into(),
                base_name: "A".into(),
            }]
        );
    }

    #[test]
    fn duplicates_of_a_dropped_base_are_held_back() {
        let segments = vec![
            Segment::host_app("1", "A"),
            Segment::host_app("2", "A-1"),
            Segment::host_app("3", "A-1-2"),
            Segment::host_app("4", "B-1"),
        ];
        let issues = [issue("1", "A", "A", IssueRole::Base)];
        let payload = build_delete_payload(&names(&["A-1", "A-1-2", "B-1"]), &segments, &issues);

        assert_eq!(payload.ids, vec!["4"]);
        let held: Vec<&str> = payload.held_back.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(held, vec!["2", "3"]);
        assert!(payload.held_back.iter().all(|h| h.base_name == "A"));
    }
}
