//! Sync-state persistence for memsync.
//!
//! Two small storage interfaces keep the orchestrator independent of the disk:
//! - [`SyncStore`]: previously synced entries (read all, upsert one), backed by
//!   libSQL in production ([`Storage`]) and by [`MemoryStore`] in tests
//! - [`SyncLog`]: the append-only audit trail, backed by a Markdown file
//!   ([`FileSyncLog`]) or by [`MemoryLog`]

mod log;
mod memory;
mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};

use memsync_shared::{MemsyncError, Result, SyncLogLine, SyncRecord};

pub use log::{FileSyncLog, format_line, parse_line};
pub use memory::{MemoryLog, MemoryStore};

// ---------------------------------------------------------------------------
// Interfaces
// ---------------------------------------------------------------------------

/// Store of previously synced entries.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Every record currently stored.
    async fn load_all(&self) -> Result<Vec<SyncRecord>>;
    /// Insert or replace the record with the same `(title, source_file)`.
    async fn upsert(&self, record: &SyncRecord) -> Result<()>;
}

/// Append-only audit log.
pub trait SyncLog: Send + Sync {
    /// Every line written so far, oldest first.
    fn read_all(&self) -> Result<Vec<SyncLogLine>>;
    /// Append one line.
    fn append(&self, line: &SyncLogLine) -> Result<()>;
}

// ---------------------------------------------------------------------------
// libSQL store
// ---------------------------------------------------------------------------

/// [`SyncStore`] backed by the sync-state file (`memory/.memsync/sync.db` by
/// default). One row per synced entry, keyed by `(title, source_file)`.
pub struct Storage {
    /// Owns the file handle the connection runs on.
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open the sync-state file at `path`, creating it and its directory on
    /// first run, and bring its schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MemsyncError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| MemsyncError::Storage(format!("open {}: {e}", path.display())))?;
        let conn = db
            .connect()
            .map_err(|e| MemsyncError::Storage(format!("connect {}: {e}", path.display())))?;

        let storage = Self { db, conn };
        storage.migrate().await?;
        tracing::debug!(path = %path.display(), "sync state ready");
        Ok(storage)
    }

    /// Apply every migration newer than the recorded schema version.
    async fn migrate(&self) -> Result<()> {
        let applied = self.schema_version().await;
        for migration in migrations::all_migrations()
            .into_iter()
            .filter(|m| m.version > applied)
        {
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "migrating sync state"
            );
            self.conn.execute_batch(migration.sql).await.map_err(|e| {
                MemsyncError::Storage(format!(
                    "sync state migration v{} failed: {e}",
                    migration.version
                ))
            })?;
        }
        Ok(())
    }

    /// Highest applied migration; 0 for a fresh state file.
    async fn schema_version(&self) -> u32 {
        let Ok(mut rows) = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await
        else {
            return 0;
        };
        match rows.next().await {
            Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
            _ => 0,
        }
    }
}

#[async_trait]
impl SyncStore for Storage {
    async fn load_all(&self) -> Result<Vec<SyncRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT title, source_file, content_hash, remote_page_id, last_synced_at
                 FROM sync_records ORDER BY source_file, title",
                params![],
            )
            .await
            .map_err(|e| MemsyncError::Storage(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| MemsyncError::Storage(e.to_string()))?
        {
            let get = |idx: i32| {
                row.get::<String>(idx)
                    .map_err(|e| MemsyncError::Storage(e.to_string()))
            };
            records.push(SyncRecord {
                title: get(0)?,
                source_file: get(1)?,
                content_hash: get(2)?,
                remote_page_id: get(3)?,
                last_synced_at: parse_timestamp(&get(4)?)?,
            });
        }
        Ok(records)
    }

    async fn upsert(&self, record: &SyncRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_records (title, source_file, content_hash, remote_page_id, last_synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(title, source_file) DO UPDATE SET
                   content_hash = excluded.content_hash,
                   remote_page_id = excluded.remote_page_id,
                   last_synced_at = excluded.last_synced_at",
                params![
                    record.title.as_str(),
                    record.source_file.as_str(),
                    record.content_hash.as_str(),
                    record.remote_page_id.as_str(),
                    record.last_synced_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| MemsyncError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MemsyncError::Storage(format!("bad timestamp '{value}': {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("memsync_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn record(title: &str, hash: &str, page: &str) -> SyncRecord {
        SyncRecord {
            title: title.into(),
            source_file: "MEMORY.md".into(),
            content_hash: hash.into(),
            remote_page_id: page.into(),
            last_synced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_creates_schema() {
        let storage = test_storage().await;
        assert_eq!(storage.schema_version().await, 1);
        assert!(storage.load_all().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn reopen_keeps_records_and_skips_migrations() {
        let tmp = std::env::temp_dir().join(format!("memsync_test_{}.db", Uuid::now_v7()));
        {
            let storage = Storage::open(&tmp).await.unwrap();
            storage.upsert(&record("A", "h1", "p1")).await.unwrap();
        }
        let storage = Storage::open(&tmp).await.expect("reopen");
        let all = storage.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].remote_page_id, "p1");
    }

    #[tokio::test]
    async fn upsert_replaces_by_identity() {
        let storage = test_storage().await;
        storage.upsert(&record("A", "h1", "p1")).await.unwrap();
        storage.upsert(&record("B", "h2", "p2")).await.unwrap();
        storage.upsert(&record("A", "h3", "p1")).await.unwrap();

        let all = storage.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        let a = all.iter().find(|r| r.title == "A").unwrap();
        assert_eq!(a.content_hash, "h3");
        assert_eq!(a.remote_page_id, "p1");
    }

    #[tokio::test]
    async fn same_title_in_other_file_is_distinct() {
        let storage = test_storage().await;
        storage.upsert(&record("A", "h1", "p1")).await.unwrap();
        let mut daily = record("A", "h2", "p2");
        daily.source_file = "2026-03-14.md".into();
        storage.upsert(&daily).await.unwrap();
        assert_eq!(storage.load_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn timestamps_roundtrip() {
        let storage = test_storage().await;
        let rec = record("A", "h1", "p1");
        storage.upsert(&rec).await.unwrap();
        let loaded = &storage.load_all().await.unwrap()[0];
        assert_eq!(loaded.last_synced_at, rec.last_synced_at);
    }
}
