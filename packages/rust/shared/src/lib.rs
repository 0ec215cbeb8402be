//! Shared types, error model, and configuration for memsync.
//!
//! This crate is the foundation depended on by all other memsync crates.
//! It provides:
//! - [`MemsyncError`]: the unified error type
//! - Domain types ([`Entry`], [`ClassifiedEntry`], [`Block`], [`SyncRecord`], [`SyncLogLine`])
//! - Configuration ([`AppConfig`], config loading, startup validation)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassifierConfig, DATABASE_ID_PLACEHOLDER, KeywordRule, LimitsConfig,
    NotionConfig, ParserConfig, WorkspaceConfig, WorkspacePaths, config_dir, config_file_path,
    expand_tilde, init_config, load_config, load_config_from, read_api_key, resolve_database_id,
};
pub use error::{MemsyncError, Result};
pub use types::{
    Block, Certainty, ClassifiedEntry, ContentType, Entry, EntrySource, Impact, SyncAction,
    SyncLogLine, SyncRecord, SyncSummary,
};
