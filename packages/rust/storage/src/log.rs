//! Markdown-backed sync log.
//!
//! Each action is one bullet line:
//! `- 2026-03-14 09:30:00: CREATED - Some title (page abc123)`

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use memsync_shared::{MemsyncError, Result, SyncAction, SyncLogLine};

use crate::SyncLog;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^- (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}): (CREATED|UPDATED|SKIPPED|FAILED) - (.*?)(?: \(([^()]*)\))?$",
    )
    .expect("sync log regex")
});

/// Render one log line, without trailing newline.
pub fn format_line(line: &SyncLogLine) -> String {
    let title = single_line(&line.title);
    let detail = single_line(&line.detail);
    let mut out = format!(
        "- {}: {} - {}",
        line.timestamp.format(TIMESTAMP_FORMAT),
        line.action,
        title
    );
    if !detail.is_empty() {
        out.push_str(&format!(" ({detail})"));
    }
    out
}

/// Parse a line written by [`format_line`]. Anything else yields `None`.
///
/// A detail containing parentheses is folded into the title on read.
pub fn parse_line(text: &str) -> Option<SyncLogLine> {
    let caps = LINE_RE.captures(text.trim_end())?;
    let timestamp = NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT).ok()?;
    let action: SyncAction = caps[2].parse().ok()?;
    Some(SyncLogLine {
        timestamp,
        action,
        title: caps[3].to_string(),
        detail: caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default(),
    })
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// [`SyncLog`] appending to a Markdown file on disk.
pub struct FileSyncLog {
    path: PathBuf,
}

impl FileSyncLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SyncLog for FileSyncLog {
    fn read_all(&self) -> Result<Vec<SyncLogLine>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MemsyncError::io(&self.path, e)),
        };

        let lines: Vec<SyncLogLine> = text.lines().filter_map(parse_line).collect();
        tracing::debug!(path = %self.path.display(), count = lines.len(), "read sync log");
        Ok(lines)
    }

    fn append(&self, line: &SyncLogLine) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| MemsyncError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MemsyncError::io(&self.path, e))?;

        writeln!(file, "{}", format_line(line)).map_err(|e| MemsyncError::io(&self.path, e))
    }
}
