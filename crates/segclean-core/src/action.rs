//! The three things a user can do with a plan.

use crate::error::ErrorCode;
use crate::gateway::{BatchKind, BatchReport, BatchRunner, ItemResult, MutationGateway};
use crate::plan::Plan;
use crate::timing;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Update the bases, then delete the duplicates.
    MergeDelete,
    MergeOnly,
    DeleteOnly,
}

impl Action {
    pub const ALL: [Self; 3] = [Self::MergeDelete, Self::MergeOnly, Self::DeleteOnly];

    #[must_use]
    pub const fn merges(self) -> bool {
        matches!(self, Self::MergeDelete | Self::MergeOnly)
    }

    #[must_use]
    pub const fn deletes(self) -> bool {
        matches!(self, Self::MergeDelete | Self::DeleteOnly)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MergeDelete => "merge-delete",
            Self::MergeOnly => "merge",
            Self::DeleteOnly => "delete",
        }
    }

    /// Heading used in prompts.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::MergeDelete => "Merge and Delete",
            Self::MergeOnly => "Merge",
            Self::DeleteOnly => "Delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "merge-delete" | "merge-and-delete" | "all" => Ok(Self::MergeDelete),
            "merge" | "merge-only" => Ok(Self::MergeOnly),
            "delete" | "delete-only" => Ok(Self::DeleteOnly),
            other => Err(format!(
                "unknown action '{other}' (expected merge-delete|merge|delete)"
            )),
        }
    }
}

/// Reports for the batches an action ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Execution {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<BatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletes: Option<BatchReport>,
}

impl Execution {
    pub fn reports(&self) -> impl Iterator<Item = &BatchReport> {
        self.updates.iter().chain(self.deletes.iter())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.reports().all(BatchReport::is_success)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports().map(BatchReport::failed).sum()
    }

    /// Code of the first batch with failures.
    #[must_use]
    pub fn failure_code(&self) -> Option<ErrorCode> {
        self.reports()
            .find(|report| !report.is_success())
            .map(BatchReport::failure_code)
    }
}

/// Run `action` over `plan`. Updates always go before deletes.
///
/// `on_item` is called for every item as soon as its outcome is known.
pub fn execute(
    plan: &Plan,
    action: Action,
    runner: &BatchRunner,
    gateway: &dyn MutationGateway,
    mut on_item: impl FnMut(BatchKind, &ItemResult),
) -> Execution {
    info!(
        %action,
        updates = plan.updates().len(),
        deletes = plan.deletes().len(),
        "executing plan"
    );

    let updates = action.merges().then(|| {
        timing::timed("apply.updates", || {
            runner.run_updates(gateway, plan.updates(), |item| on_item(BatchKind::Update, item))
        })
    });
    let deletes = action.deletes().then(|| {
        timing::timed("apply.deletes", || {
            runner.run_deletes(gateway, plan.deletes(), |item| on_item(BatchKind::Delete, item))
        })
    });

    Execution {
        action,
        updates,
        deletes,
    }
}
