//! In-memory store and log, used by tests and dry-run tooling.

use std::sync::Mutex;

use async_trait::async_trait;

use memsync_shared::{MemsyncError, Result, SyncLogLine, SyncRecord};

use crate::{SyncLog, SyncStore};

fn poisoned() -> MemsyncError {
    MemsyncError::Storage("in-memory lock poisoned".into())
}

/// [`SyncStore`] holding records in a `Vec`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<SyncRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SyncRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Snapshot of the current records.
    pub fn records(&self) -> Vec<SyncRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<SyncRecord>> {
        Ok(self.records.lock().map_err(|_| poisoned())?.clone())
    }

    async fn upsert(&self, record: &SyncRecord) -> Result<()> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        match records
            .iter_mut()
            .find(|r| r.title == record.title && r.source_file == record.source_file)
        {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }
}

/// [`SyncLog`] holding lines in a `Vec`.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<SyncLogLine>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncLog for MemoryLog {
    fn read_all(&self) -> Result<Vec<SyncLogLine>> {
        Ok(self.lines.lock().map_err(|_| poisoned())?.clone())
    }

    fn append(&self, line: &SyncLogLine) -> Result<()> {
        self.lines.lock().map_err(|_| poisoned())?.push(line.clone());
        Ok(())
    }
}
