//! Core domain types for memsync.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// Which kind of memory file an entry was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// The long-lived primary memory file (`MEMORY.md`).
    MemoryFile,
    /// A dated daily file (`memory/YYYY-MM-DD.md`).
    Daily,
}

impl EntrySource {
    /// Option name used for the remote `Source` select property.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemoryFile => "MEMORY.md",
            Self::Daily => "daily",
        }
    }
}

/// One logical unit of knowledge extracted from a memory file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Heading text of the entry.
    pub title: String,
    /// Markdown lines under the heading, trimmed of leading/trailing blank lines.
    pub body: Vec<String>,
    /// File name the entry came from (e.g. `MEMORY.md`, `2026-03-14.md`).
    pub source_file: String,
    /// Date encoded in the file name, for daily files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_date: Option<NaiveDate>,
    /// Enclosing section heading, if the entry sat under one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Primary file or daily file.
    pub source: EntrySource,
    /// Set when the parser could not make sense of the fragment and kept it raw.
    #[serde(default)]
    pub unparsed: bool,
}

impl Entry {
    /// The body joined back into a single Markdown string.
    pub fn body_text(&self) -> String {
        self.body.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Classification enums
// ---------------------------------------------------------------------------

/// Kind of knowledge an entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Research,
    Lesson,
    Decision,
    Pattern,
    Tutorial,
    Reference,
    Insight,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "Research",
            Self::Lesson => "Lesson",
            Self::Decision => "Decision",
            Self::Pattern => "Pattern",
            Self::Tutorial => "Tutorial",
            Self::Reference => "Reference",
            Self::Insight => "Insight",
        }
    }
}

/// How well-established the content is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Certainty {
    Verified,
    Likely,
    Speculative,
    Opinion,
}

impl Certainty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "Verified",
            Self::Likely => "Likely",
            Self::Speculative => "Speculative",
            Self::Opinion => "Opinion",
        }
    }
}

/// Estimated impact of the knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
    Low,
    Negligible,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Negligible => "Negligible",
        }
    }
}

/// An [`Entry`] plus everything the classifier derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedEntry {
    pub entry: Entry,
    pub content_type: ContentType,
    pub domain: String,
    pub certainty: Certainty,
    /// Heuristic confidence, always within `1..=10`.
    pub confidence_score: u8,
    pub impact: Impact,
    /// Deduplicated tags in deterministic order.
    pub tags: Vec<String>,
    /// Hex SHA-256 of `(title, body, source_file)`.
    pub content_hash: String,
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// One structured content unit of the remote page body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: String },
    BulletItem { text: String },
    NumberedItem { text: String },
    Code { language: Option<String>, text: String },
    Quote { text: String },
    Divider,
    /// A single table row. `header` marks a row followed by a `|---|` separator.
    TableRow { cells: Vec<String>, header: bool },
    Paragraph { text: String },
}

impl Block {
    /// Number of characters of text this block carries.
    pub fn text_len(&self) -> usize {
        match self {
            Self::Heading { text, .. }
            | Self::BulletItem { text }
            | Self::NumberedItem { text }
            | Self::Code { text, .. }
            | Self::Quote { text }
            | Self::Paragraph { text } => text.chars().count(),
            Self::TableRow { cells, .. } => cells.iter().map(|c| c.chars().count()).sum(),
            Self::Divider => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Sync bookkeeping
// ---------------------------------------------------------------------------

/// Persisted record of a previously synced entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Entry title (identity, together with `source_file`).
    pub title: String,
    /// Entry source file (identity, together with `title`).
    pub source_file: String,
    /// Content hash at the time of the last successful sync.
    pub content_hash: String,
    /// Remote page the entry was written to.
    pub remote_page_id: String,
    pub last_synced_at: DateTime<Utc>,
}

/// Outcome recorded in the sync log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncAction {
    Created,
    Updated,
    Skipped,
    Failed,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Skipped => "SKIPPED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "UPDATED" => Ok(Self::Updated),
            "SKIPPED" => Ok(Self::Skipped),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown sync action '{other}'")),
        }
    }
}

/// One line of the append-only sync log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogLine {
    /// Local wall-clock time the action happened.
    pub timestamp: NaiveDateTime,
    pub action: SyncAction,
    pub title: String,
    pub detail: String,
}

/// Aggregate counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncSummary {
    /// Count one outcome.
    pub fn record(&mut self, action: SyncAction) {
        self.processed += 1;
        match action {
            SyncAction::Created => self.created += 1,
            SyncAction::Updated => self.updated += 1,
            SyncAction::Skipped => self.skipped += 1,
            SyncAction::Failed => self.failed += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Entry {
        Entry {
            title: "Use Postgres".into(),
            body: vec!["We decided.".into(), "".into(), "- fast".into()],
            source_file: "MEMORY.md".into(),
            source_date: None,
            section: Some("Decisions".into()),
            source: EntrySource::MemoryFile,
            unparsed: false,
        }
    }

    #[test]
    fn body_text_joins_lines() {
        assert_eq!(entry().body_text(), "We decided.\n\n- fast");
    }

    #[test]
    fn sync_action_parses_its_display() {
        for action in [
            SyncAction::Created,
            SyncAction::Updated,
            SyncAction::Skipped,
            SyncAction::Failed,
        ] {
            assert_eq!(action.to_string().parse::<SyncAction>(), Ok(action));
        }
        assert!("DRY-RUN".parse::<SyncAction>().is_err());
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = SyncSummary::default();
        summary.record(SyncAction::Created);
        summary.record(SyncAction::Failed);
        summary.record(SyncAction::Skipped);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn block_text_len_counts_chars() {
        let block = Block::TableRow {
            cells: vec!["ab".into(), "ü".into()],
            header: true,
        };
        assert_eq!(block.text_len(), 3);
        assert_eq!(Block::Divider.text_len(), 0);
    }

    #[test]
    fn entry_serialization() {
        let json = serde_json::to_string(&entry()).expect("serialize");
        assert!(!json.contains("source_date"));
        let parsed: Entry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, entry());
    }
}
