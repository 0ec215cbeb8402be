//! SQL migration definitions for the memsync state database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: sync_records",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per synced entry, keyed by its identity
CREATE TABLE IF NOT EXISTS sync_records (
    title           TEXT NOT NULL,
    source_file     TEXT NOT NULL,
    content_hash    TEXT NOT NULL,
    remote_page_id  TEXT NOT NULL,
    last_synced_at  TEXT NOT NULL,
    PRIMARY KEY (title, source_file)
);

CREATE INDEX IF NOT EXISTS idx_sync_records_hash ON sync_records(content_hash);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
