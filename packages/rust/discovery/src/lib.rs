//! Memory-file discovery and entry extraction.
//!
//! A workspace holds one primary memory file (`MEMORY.md`) plus a directory of
//! dated daily files named `YYYY-MM-DD.md`. Discovery finds the files inside the
//! lookback window; [`parser`] turns each file into entries.

mod parser;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{Days, NaiveDate};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use memsync_shared::{Entry, EntrySource, MemsyncError, ParserConfig, Result, WorkspacePaths};

pub use parser::{Entries, ParseOptions, SourceRef, parse_entries};

/// Matches daily file names and captures the date part.
static DAILY_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})\.md$").expect("daily file regex"));

// ---------------------------------------------------------------------------
// MemoryFile
// ---------------------------------------------------------------------------

/// A memory file selected for syncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// File name recorded on entries (`MEMORY.md`, `2026-03-14.md`).
    pub file_name: String,
    /// Date parsed from the file name, for daily files.
    pub date: Option<NaiveDate>,
    pub source: EntrySource,
}

impl MemoryFile {
    fn source_ref(&self) -> SourceRef {
        SourceRef {
            file_name: self.file_name.clone(),
            date: self.date,
            source: self.source,
        }
    }
}

// ---------------------------------------------------------------------------
// Date handling
// ---------------------------------------------------------------------------

/// Parse a `YYYY-MM-DD` date (the `--since` argument).
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        MemsyncError::validation(format!("invalid date '{value}' (expected YYYY-MM-DD): {e}"))
    })
}

/// First date of the window: `since` if given, otherwise `lookback_days` back from `today`
/// (today inclusive).
pub fn window_start(since: Option<NaiveDate>, today: NaiveDate, lookback_days: u32) -> NaiveDate {
    since.unwrap_or_else(|| {
        let back = u64::from(lookback_days.saturating_sub(1));
        today.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN)
    })
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Find the primary memory file and all daily files dated on or after `from`.
///
/// The primary file must exist and be a regular file; anything else is a startup
/// error. A missing daily directory just means there are no daily files.
#[instrument(skip_all, fields(root = %paths.root.display(), from = %from))]
pub fn discover(paths: &WorkspacePaths, from: NaiveDate) -> Result<Vec<MemoryFile>> {
    let meta = std::fs::metadata(&paths.memory_file)
        .map_err(|e| MemsyncError::io(&paths.memory_file, e))?;
    if !meta.is_file() {
        return Err(MemsyncError::validation(format!(
            "primary memory file {} is not a regular file",
            paths.memory_file.display()
        )));
    }

    let mut files = vec![MemoryFile {
        path: paths.memory_file.clone(),
        file_name: file_name_of(&paths.memory_file),
        date: None,
        source: EntrySource::MemoryFile,
    }];

    let mut daily = list_daily_files(&paths.memory_dir)?;
    daily.retain(|f| f.date.is_some_and(|d| d >= from));
    daily.sort_by_key(|f| f.date);

    info!(daily = daily.len(), "memory files discovered");
    files.extend(daily);
    Ok(files)
}

fn list_daily_files(dir: &Path) -> Result<Vec<MemoryFile>> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "no daily memory directory");
            return Ok(Vec::new());
        }
        Err(e) => return Err(MemsyncError::io(dir, e)),
    };

    let mut files = Vec::new();
    for dirent in read_dir {
        let dirent = dirent.map_err(|e| MemsyncError::io(dir, e))?;
        let name = dirent.file_name().to_string_lossy().to_string();
        let Some(caps) = DAILY_FILE_RE.captures(&name) else {
            continue;
        };
        match parse_date(&caps[1]) {
            Ok(date) => files.push(MemoryFile {
                path: dirent.path(),
                file_name: name.clone(),
                date: Some(date),
                source: EntrySource::Daily,
            }),
            Err(e) => debug!(file = %name, error = %e, "skipping file with impossible date"),
        }
    }
    Ok(files)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read one memory file and parse it into entries.
///
/// Invalid UTF-8 is replaced rather than rejected.
#[instrument(skip_all, fields(file = %file.file_name))]
pub fn read_entries(file: &MemoryFile, config: &ParserConfig) -> Result<Vec<Entry>> {
    let bytes = std::fs::read(&file.path).map_err(|e| MemsyncError::io(&file.path, e))?;
    let text = String::from_utf8_lossy(&bytes);

    let opts = ParseOptions::for_source(config, file.source);
    let source = file.source_ref();
    let entries: Vec<Entry> = parse_entries(&text, &source, &opts).collect();

    debug!(entries = entries.len(), "parsed memory file");
    Ok(entries)
}

/// Read every file in order. The primary file must be readable; unreadable daily
/// files are skipped with a warning.
pub fn read_all_entries(files: &[MemoryFile], config: &ParserConfig) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for file in files {
        match read_entries(file, config) {
            Ok(parsed) => entries.extend(parsed),
            Err(e) if file.source == EntrySource::MemoryFile => return Err(e),
            Err(e) => warn!(file = %file.file_name, error = %e, "skipping unreadable daily file"),
        }
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
