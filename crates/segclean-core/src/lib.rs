//! segclean-core library.
//!
//! Pure pipeline over an already-fetched segment store:
//!
//! ```text
//! SegmentSource -> classify -> build_update_list -> build_delete_payload -> execute
//! ```
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums at module boundaries, `anyhow::Result` for
//!   config loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod action;
pub mod classify;
pub mod config;
pub mod dump;
pub mod error;
pub mod gateway;
pub mod merge;
pub mod model;
pub mod payload;
pub mod plan;
pub mod source;
pub mod timing;

pub use action::{Action, Execution, execute};
pub use classify::{Classification, NameFilter, classify};
pub use merge::{MatchPolicy, MergeIssue, MergeOutcome, build_update_list};
pub use model::{Segment, SegmentQuery, SegmentType};
pub use payload::{build_delete_list, build_delete_payload};
pub use plan::Plan;
