//! Union duplicate attributes into their base segments.
//!
//! The merge never touches the store: true-base records are cloned and the
//! clones are extended, so the same inputs always produce the same outcome.

use crate::classify::base_name_of;
use crate::model::{ListField, Segment};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Which segments contribute their lists to a base segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Any other segment whose name contains the base name.
    #[default]
    Contains,
    /// Only recognized duplicates of the base (`<base>-<n>`).
    Suffix,
}

impl MatchPolicy {
    /// Whether a segment named `candidate` contributes to the base `base_name`.
    #[must_use]
    pub fn contributes(self, base_name: &str, candidate: &str) -> bool {
        match self {
            Self::Contains => candidate != base_name && candidate.contains(base_name),
            Self::Suffix => base_name_of(candidate) == Some(base_name),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Suffix => "suffix",
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contains" | "substring" => Ok(Self::Contains),
            "suffix" | "strict" => Ok(Self::Suffix),
            other => Err(format!("unknown match policy '{other}' (expected contains|suffix)")),
        }
    }
}

/// Role a malformed record would have played in the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueRole {
    Base,
    Contributor,
}

/// A record skipped because it lacks one or more list fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeIssue {
    pub segment_id: String,
    pub segment_name: String,
    pub base_name: String,
    pub role: IssueRole,
    pub missing: Vec<ListField>,
}

impl fmt::Display for MergeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let missing: Vec<&str> = self.missing.iter().map(|field| field.as_str()).collect();
        match self.role {
            IssueRole::Base => write!(
                f,
                "base segment '{}' ({}) skipped: missing {}",
                self.segment_name,
                self.segment_id,
                missing.join(", ")
            ),
            IssueRole::Contributor => write!(
                f,
                "'{}' ({}) not merged into '{}': missing {}",
                self.segment_name,
                self.segment_id,
                self.base_name,
                missing.join(", ")
            ),
        }
    }
}

/// One contributor folded into one base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contribution {
    pub base_id: String,
    pub base_name: String,
    pub from_id: String,
    pub from_name: String,
    /// Entries newly added to the base across all four fields.
    pub added: usize,
}

/// Result of [`build_update_list`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeOutcome {
    /// Merged true-base records in store order.
    pub merged: Vec<Segment>,
    pub contributions: Vec<Contribution>,
    pub issues: Vec<MergeIssue>,
}

/// Append every entry of `source`'s list fields missing from `target`'s.
///
/// Returns the number of entries added. Fields absent on either side are
/// left alone; callers check completeness first.
pub fn union_into(target: &mut Segment, source: &Segment) -> usize {
    let mut added = 0;
    for field in ListField::ALL {
        let (Some(into), Some(from)) = (target.query.list_mut(field), source.list(field)) else {
            continue;
        };
        for entry in from {
            if !into.contains(entry) {
                into.push(entry.clone());
                added += 1;
            }
        }
    }
    added
}

/// Drop repeated entries within each list field, keeping first occurrences.
pub fn dedup_lists(segment: &mut Segment) {
    for field in ListField::ALL {
        let Some(list) = segment.query.list_mut(field) else {
            continue;
        };
        let mut kept: Vec<Value> = Vec::with_capacity(list.len());
        for entry in list.drain(..) {
            if !kept.contains(&entry) {
                kept.push(entry);
            }
        }
        *list = kept;
    }
}

/// Build merged base records for every name in `base_names` that exists in
/// `segments`.
///
/// Base names with no matching record produce nothing. A base record missing
/// a list field is dropped and reported; a contributor missing a list field
/// is skipped for that base and reported.
#[must_use]
pub fn build_update_list(
    base_names: &BTreeSet<String>,
    segments: &[Segment],
    policy: MatchPolicy,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for segment in segments.iter().filter(|s| base_names.contains(&s.name)) {
        let missing = segment.query.missing_fields();
        if missing.is_empty() {
            let mut base = segment.clone();
            dedup_lists(&mut base);
            outcome.merged.push(base);
        } else {
            warn!(id = %segment.id, name = %segment.name, "base segment is missing query lists");
            outcome.issues.push(MergeIssue {
                segment_id: segment.id.clone(),
                segment_name: segment.name.clone(),
                base_name: segment.name.clone(),
                role: IssueRole::Base,
                missing,
            });
        }
    }

    for candidate in segments {
        for base in &mut outcome.merged {
            if !policy.contributes(&base.name, &candidate.name) {
                continue;
            }

            let missing = candidate.query.missing_fields();
            if !missing.is_empty() {
                warn!(
                    id = %candidate.id,
                    name = %candidate.name,
                    base = %base.name,
                    "skipping contributor with missing query lists"
                );
                outcome.issues.push(MergeIssue {
                    segment_id: candidate.id.clone(),
                    segment_name: candidate.name.clone(),
                    base_name: base.name.clone(),
                    role: IssueRole::Contributor,
                    missing,
                });
                continue;
            }

            let added = union_into(base, candidate);
            debug!(base = %base.name, from = %candidate.name, added, "merged contributor");
            outcome.contributions.push(Contribution {
                base_id: base.id.clone(),
                base_name: base.name.clone(),
                from_id: candidate.id.clone(),
                from_name: candidate.name.clone(),
                added,
            });
        }
    }

    outcome
}
