//! Where the segment store comes from.

use crate::error::ErrorCode;
use crate::model::Segment;
use serde::Deserialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Errors raised while obtaining the segment store. Fatal for the cycle.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("segment store is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("API base URL is not configured")]
    NotConfigured,

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },
}

impl SourceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } | Self::Transport { .. } | Self::Status { .. } => {
                ErrorCode::FetchFailed
            }
            Self::Parse(_) => ErrorCode::StoreParseError,
            Self::NotConfigured => ErrorCode::ApiNotConfigured,
        }
    }
}

/// Supplies every segment, regardless of category.
pub trait SegmentSource {
    /// Fetch the full segment store for one cycle.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the store cannot be read or decoded.
    fn fetch_all(&self) -> Result<Vec<Segment>, SourceError>;

    /// Short label for logs and headers.
    fn describe(&self) -> String;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoreDocument {
    Bare(Vec<Segment>),
    Page { content: Vec<Segment> },
}

/// Decode a store from either a bare JSON array or an API page
/// (`{"content": [...]}`).
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the text matches neither shape.
pub fn parse_store(raw: &str) -> Result<Vec<Segment>, SourceError> {
    let segments = match serde_json::from_str::<StoreDocument>(raw)? {
        StoreDocument::Bare(segments) => segments,
        StoreDocument::Page { content } => content,
    };
    warn_duplicate_ids(&segments);
    Ok(segments)
}

/// Log ids that occur more than once. Ids are expected to be unique.
pub fn warn_duplicate_ids(segments: &[Segment]) {
    let mut seen = HashSet::with_capacity(segments.len());
    for segment in segments {
        if !seen.insert(segment.id.as_str()) {
            warn!(id = %segment.id, name = %segment.name, "segment id appears more than once");
        }
    }
}

/// Local JSON snapshot of the store, used to avoid repeat API calls while testing.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SegmentSource for FileSource {
    fn fetch_all(&self) -> Result<Vec<Segment>, SourceError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;
        let segments = parse_store(&raw)?;
        info!(path = %self.path.display(), count = segments.len(), "loaded segments from file");
        Ok(segments)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
