//! Diagnostic snapshot of a plan, for offline inspection.
//!
//! Writes two files into the diagnostics directory:
//!
//! - `update_list.json`: the update payload exactly as it would be sent.
//! - `diagnostic.json`: filter, classification, delete ids, held-back
//!   duplicates and merge issues.

use crate::classify::NameFilter;
use crate::error::ErrorCode;
use crate::merge::{MatchPolicy, MergeIssue};
use crate::payload::HeldBack;
use crate::plan::{Plan, PlanSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const UPDATE_LIST_FILE: &str = "update_list.json";
pub const DIAGNOSTIC_FILE: &str = "diagnostic.json";

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode diagnostics: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DumpError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::DumpWriteFailed
    }
}

#[derive(Debug, Serialize)]
struct Diagnostic<'a> {
    generated_at: DateTime<Utc>,
    filter: &'a NameFilter,
    policy: MatchPolicy,
    summary: PlanSummary,
    base_names: &'a BTreeSet<String>,
    duplicate_names: &'a BTreeSet<String>,
    orphan_bases: Vec<&'a str>,
    delete_ids: &'a [String],
    held_back: &'a [HeldBack],
    issues: &'a [MergeIssue],
}

/// Files written by [`write_dump`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpPaths {
    pub update_list: PathBuf,
    pub diagnostic: PathBuf,
}

/// Write the snapshot for `plan` into `dir`, creating it if needed.
///
/// # Errors
///
/// Returns [`DumpError`] if the directory or either file cannot be written.
pub fn write_dump(dir: &Path, plan: &Plan) -> Result<DumpPaths, DumpError> {
    std::fs::create_dir_all(dir).map_err(|source| DumpError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let update_list = dir.join(UPDATE_LIST_FILE);
    write_json(&update_list, &plan.updates())?;

    let diagnostic = dir.join(DIAGNOSTIC_FILE);
    write_json(
        &diagnostic,
        &Diagnostic {
            generated_at: Utc::now(),
            filter: &plan.filter,
            policy: plan.policy,
            summary: plan.summary(),
            base_names: &plan.classification.base_names,
            duplicate_names: &plan.classification.duplicate_names,
            orphan_bases: plan.orphan_bases(),
            delete_ids: plan.deletes(),
            held_back: plan.held_back(),
            issues: plan.issues(),
        },
    )?;

    info!(dir = %dir.display(), "wrote diagnostic dump");
    Ok(DumpPaths {
        update_list,
        diagnostic,
    })
}

/// Pretty JSON with four-space indentation.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DumpError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    buf.push(b'\n');

    std::fs::write(path, buf).map_err(|source| DumpError::Io {
        path: path.to_path_buf(),
        source,
    })
}
