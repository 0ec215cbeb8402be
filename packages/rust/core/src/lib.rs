//! Core pipeline orchestration and domain logic for memsync.
//!
//! This crate ties together discovery, classification, block conversion,
//! deduplication and the remote writer into one sync run.

pub mod classify;
pub mod dedup;
pub mod pipeline;

pub use classify::{Classifier, KeywordTables};
pub use dedup::{Decision, SyncIndex, collapse_duplicates, content_hash};
pub use pipeline::{
    EntryOutcome, ProgressReporter, SilentProgress, SyncConfig, SyncOrchestrator, SyncReport,
    build_page, first_link,
};
