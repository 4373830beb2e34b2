//! Applying payloads to the remote system.
//!
//! [`MutationGateway`] is the seam to the server. [`BatchRunner`] drives it one
//! item at a time with a fixed delay between calls. A failed item is recorded
//! and the batch moves on; nothing is retried here.

use crate::error::ErrorCode;
use crate::model::Segment;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A single mutation call failed.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{url} returned HTTP {status}: {body}")]
    Rejected { url: String, status: u16, body: String },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Server-side result of a delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    Deleted,
    /// The ids were already gone; treated as a no-op.
    AlreadyGone,
}

/// Applies update and delete payloads.
pub trait MutationGateway {
    /// Replace one segment server-side, addressed by its id.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the call is rejected or cannot be sent.
    fn apply_update(&self, segment: &Segment) -> Result<(), GatewayError>;

    /// Remove every listed segment in one call.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the call is rejected or cannot be sent.
    fn apply_bulk_delete(&self, ids: &[String]) -> Result<DeleteStatus, GatewayError>;
}

/// How the delete payload is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteMode {
    /// One bulk-delete call per id, each with a singleton list.
    #[default]
    PerId,
    /// One bulk-delete call carrying every id.
    Bulk,
}

impl FromStr for DeleteMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "per-id" | "per_id" | "single" => Ok(Self::PerId),
            "bulk" | "batch" => Ok(Self::Bulk),
            other => Err(format!("unknown delete mode '{other}' (expected per-id|bulk)")),
        }
    }
}

/// Which payload a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Update,
    Delete,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Result for one payload item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    AlreadyGone,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ItemResult {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }

    /// Name when known, id otherwise.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Per-item outcomes of one batch, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub kind: BatchKind,
    pub items: Vec<ItemResult>,
}

impl BatchReport {
    #[must_use]
    pub const fn new(kind: BatchKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Applied))
    }

    #[must_use]
    pub fn already_gone(&self) -> usize {
        self.count(|o| matches!(o, Outcome::AlreadyGone))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|item| item.is_failure())
    }

    /// Error code for a report with failures.
    #[must_use]
    pub const fn failure_code(&self) -> ErrorCode {
        match self.kind {
            BatchKind::Update => ErrorCode::UpdateRejected,
            BatchKind::Delete => ErrorCode::DeleteRejected,
        }
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.outcome)).count()
    }
}

/// Sequential submitter with a fixed inter-call delay.
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    call_delay: Duration,
    settle_delay: Duration,
    delete_mode: DeleteMode,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(2), DeleteMode::PerId)
    }
}

impl BatchRunner {
    #[must_use]
    pub const fn new(call_delay: Duration, settle_delay: Duration, delete_mode: DeleteMode) -> Self {
        Self {
            call_delay,
            settle_delay,
            delete_mode,
        }
    }

    /// A runner that never sleeps.
    #[must_use]
    pub const fn immediate(delete_mode: DeleteMode) -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, delete_mode)
    }

    #[must_use]
    pub const fn delete_mode(&self) -> DeleteMode {
        self.delete_mode
    }

    /// Submit each merged record as its own update call.
    ///
    /// `on_item` sees every result as soon as it is known.
    pub fn run_updates(
        &self,
        gateway: &dyn MutationGateway,
        updates: &[Segment],
        mut on_item: impl FnMut(&ItemResult),
    ) -> BatchReport {
        let mut report = BatchReport::new(BatchKind::Update);

        for (index, segment) in updates.iter().enumerate() {
            self.pace(index);
            let outcome = match gateway.apply_update(segment) {
                Ok(()) => {
                    info!(id = %segment.id, name = %segment.name, "updated segment");
                    Outcome::Applied
                }
                Err(err) => {
                    warn!(id = %segment.id, name = %segment.name, error = %err, "update failed");
                    Outcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            let item = ItemResult {
                id: segment.id.clone(),
                name: Some(segment.name.clone()),
                outcome,
            };
            on_item(&item);
            report.items.push(item);
        }

        self.settle(&report);
        report
    }

    /// Submit the delete payload according to the configured [`DeleteMode`].
    pub fn run_deletes(
        &self,
        gateway: &dyn MutationGateway,
        ids: &[String],
        mut on_item: impl FnMut(&ItemResult),
    ) -> BatchReport {
        let mut report = BatchReport::new(BatchKind::Delete);

        match self.delete_mode {
            DeleteMode::PerId => {
                for (index, id) in ids.iter().enumerate() {
                    self.pace(index);
                    let outcome = delete_outcome(gateway.apply_bulk_delete(std::slice::from_ref(id)));
                    let item = ItemResult {
                        id: id.clone(),
                        name: None,
                        outcome,
                    };
                    on_item(&item);
                    report.items.push(item);
                }
            }
            DeleteMode::Bulk if !ids.is_empty() => {
                let outcome = delete_outcome(gateway.apply_bulk_delete(ids));
                for id in ids {
                    let item = ItemResult {
                        id: id.clone(),
                        name: None,
                        outcome: outcome.clone(),
                    };
                    on_item(&item);
                    report.items.push(item);
                }
            }
            DeleteMode::Bulk => {}
        }

        for item in &report.items {
            match &item.outcome {
                Outcome::Applied => info!(id = %item.id, "deleted segment"),
                Outcome::AlreadyGone => info!(id = %item.id, "segment already gone"),
                Outcome::Failed { error } => warn!(id = %item.id, %error, "delete failed"),
            }
        }

        self.settle(&report);
        report
    }

    fn pace(&self, index: usize) {
        if index > 0 && !self.call_delay.is_zero() {
            std::thread::sleep(self.call_delay);
        }
    }

    fn settle(&self, report: &BatchReport) {
        debug!(
            kind = %report.kind,
            applied = report.applied(),
            already_gone = report.already_gone(),
            failed = report.failed(),
            "batch complete"
        );
        if !report.items.is_empty() && !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }
    }
}

fn delete_outcome(result: Result<DeleteStatus, GatewayError>) -> Outcome {
    match result {
        Ok(DeleteStatus::Deleted) => Outcome::Applied,
        Ok(DeleteStatus::AlreadyGone) => Outcome::AlreadyGone,
        Err(err) => Outcome::Failed {
            error: err.to_string(),
        },
    }
}

/// One call observed by [`DryRunGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum RecordedCall {
    Update { id: String, name: String },
    BulkDelete { ids: Vec<String> },
}

/// Gateway that only logs and records what it would have sent.
#[derive(Debug, Default)]
pub struct DryRunGateway {
    calls: RefCell<Vec<RecordedCall>>,
}

impl DryRunGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }
}

impl MutationGateway for DryRunGateway {
    fn apply_update(&self, segment: &Segment) -> Result<(), GatewayError> {
        info!(id = %segment.id, name = %segment.name, "dry run: would update segment");
        self.calls.borrow_mut().push(RecordedCall::Update {
            id: segment.id.clone(),
            name: segment.name.clone(),
        });
        Ok(())
    }

    fn apply_bulk_delete(&self, ids: &[String]) -> Result<DeleteStatus, GatewayError> {
        info!(?ids, "dry run: would delete segments");
        self.calls.borrow_mut().push(RecordedCall::BulkDelete { ids: ids.to_vec() });
        Ok(DeleteStatus::Deleted)
    }
}
