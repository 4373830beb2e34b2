//! One cycle of the engine: classification, merge and payloads together.

use crate::classify::{Classification, NameFilter, classify};
use crate::merge::{IssueRole, MatchPolicy, MergeIssue, MergeOutcome, build_update_list};
use crate::model::Segment;
use crate::payload::{DeletePayload, HeldBack, build_delete_payload};
use crate::timing;
use serde::Serialize;
use tracing::info;

/// A base segment with the duplicates that will be folded into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub base_id: String,
    pub base_name: String,
    pub duplicates: Vec<String>,
}

/// Counts for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub base_names: usize,
    pub duplicate_names: usize,
    pub updates: usize,
    pub deletes: usize,
    pub held_back: usize,
    pub issues: usize,
}

/// Everything derived from one segment store.
///
/// Built fresh each cycle; nothing carries over between cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    pub filter: NameFilter,
    pub policy: MatchPolicy,
    pub classification: Classification,
    pub merge: MergeOutcome,
    pub deletes: DeletePayload,
}

impl Plan {
    /// Run classify, merge and delete derivation over `segments`.
    #[must_use]
    pub fn build(segments: &[Segment], filter: &NameFilter, policy: MatchPolicy) -> Self {
        let classification = timing::timed("engine.classify", || classify(segments, filter));
        let merge = timing::timed("engine.merge", || {
            build_update_list(&classification.base_names, segments, policy)
        });
        let deletes = timing::timed("engine.deletes", || {
            build_delete_payload(&classification.duplicate_names, segments, &merge.issues)
        });

        let plan = Self {
            filter: filter.clone(),
            policy,
            classification,
            merge,
            deletes,
        };
        let summary = plan.summary();
        info!(
            segments = segments.len(),
            bases = summary.base_names,
            duplicates = summary.duplicate_names,
            updates = summary.updates,
            deletes = summary.deletes,
            held_back = summary.held_back,
            issues = summary.issues,
            "built plan"
        );
        plan
    }

    /// `true` when there is nothing to merge and nothing to delete.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.merge.merged.is_empty() && self.deletes.ids.is_empty()
    }

    /// Update payload: merged base records.
    #[must_use]
    pub fn updates(&self) -> &[Segment] {
        &self.merge.merged
    }

    /// Delete payload: duplicate ids.
    #[must_use]
    pub fn deletes(&self) -> &[String] {
        &self.deletes.ids
    }

    /// Duplicates kept out of the delete payload because the merge skipped them.
    #[must_use]
    pub fn held_back(&self) -> &[HeldBack] {
        &self.deletes.held_back
    }

    /// `true` if at least one record named `name` is in the delete payload.
    #[must_use]
    pub fn deletes_name(&self, name: &str) -> bool {
        self.deletes.names.contains(name)
    }

    #[must_use]
    pub fn issues(&self) -> &[MergeIssue] {
        &self.merge.issues
    }

    /// One group per merged base record, in update order.
    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.merge
            .merged
            .iter()
            .map(|base| Group {
                base_id: base.id.clone(),
                base_name: base.name.clone(),
                duplicates: self
                    .classification
                    .duplicates_of(&base.name)
                    .map(String::from)
                    .collect(),
            })
            .collect()
    }

    /// Base names that have duplicates but no base record at all.
    ///
    /// A base whose record was dropped as malformed is not an orphan: its
    /// duplicates are held back instead.
    #[must_use]
    pub fn orphan_bases(&self) -> Vec<&str> {
        self.classification
            .base_names
            .iter()
            .map(String::as_str)
            .filter(|name| !self.merge.merged.iter().any(|s| s.name == *name))
            .filter(|name| {
                !self
                    .merge
                    .issues
                    .iter()
                    .any(|issue| issue.role == IssueRole::Base && issue.base_name == *name)
            })
            .collect()
    }

    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            base_names: self.classification.base_names.len(),
            duplicate_names: self.classification.duplicate_names.len(),
            updates: self.merge.merged.len(),
            deletes: self.deletes.ids.len(),
            held_back: self.deletes.held_back.len(),
            issues: self.merge.issues.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ListField;

    #[test]
    fn groups_pair_bases_with_their_duplicates() {
        let segments = vec![
            Segment::host_app("1", "A"),
            Segment::host_app("2", "A-1"),
            Segment::host_app("3", "A-2"),
            Segment::host_app("4", "B-1"),
        ];
        let plan = Plan::build(&segments, &NameFilter::none(), MatchPolicy::Contains);
        assert_eq!(
            plan.groups(),
            vec![Group {
                base_id: "1".into(),
                base_name: "A".into(),
                duplicates: vec!["A-1".into(), "A-2".into()],
            }]
        );
        assert_eq!(plan.orphan_bases(), vec!["B"]);
        assert_eq!(plan.deletes(), ["2", "3", "4"]);
        assert!(!plan.is_empty());
    }

    #[test]
    fn empty_store_builds_an_empty_plan() {
        let plan = Plan::build(&[], &NameFilter::none(), MatchPolicy::Contains);
        assert!(plan.is_empty());
        assert!(plan.classification.is_empty());
        assert_eq!(plan.summary().updates, 0);
        assert!(plan.groups().is_empty());
    }

    #[test]
    fn summary_counts_issues() {
        let segments = vec![
            Segment::host_app("1", "A").without(ListField::AppNames),
            Segment::host_app("2", "A-1"),
        ];
        let plan = Plan::build(&segments, &NameFilter::none(), MatchPolicy::Contains);
        let summary = plan.summary();
        assert_eq!(summary.issues, 1);
        assert_eq!(summary.updates, 0);
        assert_eq!(summary.deletes, 0);
        assert_eq!(summary.held_back, 1);
        assert_eq!(plan.issues().len(), 1);
        assert!(plan.orphan_bases().is_empty());
        assert!(plan.is_empty());
    }

    #[test]
    fn held_back_names_are_not_reported_as_deleted() {
        let segments = vec![
            Segment::host_app("1", "A"),
            Segment::host_app("2", "A-1").without(ListField::Hosts),
            Segment::host_app("3", "A-2"),
        ];
        let plan = Plan::build(&segments, &NameFilter::none(), MatchPolicy::Suffix);
        assert_eq!(plan.deletes(), ["3"]);
        assert!(plan.deletes_name("A-2"));
        assert!(!plan.deletes_name("A-1"));
        assert_eq!(plan.held_back()[0].id, "2");
    }
}
