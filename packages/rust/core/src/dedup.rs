//! Content hashing and create/update/skip decisions.
//!
//! An entry's identity is `(title, source_file)`; its content hash covers
//! title, body and source file. The [`SyncIndex`] is built from the stored
//! records at the start of a run and kept current as entries are written.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use memsync_shared::{ClassifiedEntry, Entry, SyncRecord};

/// Separates hashed fields so `("ab", "c")` and `("a", "bc")` differ.
const FIELD_SEPARATOR: u8 = 0x1f;

/// Hex SHA-256 of the entry's title, body lines and source file.
///
/// Dates, section and classification are deliberately outside the hash.
pub fn content_hash(entry: &Entry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry.title.as_bytes());
    hasher.update([FIELD_SEPARATOR]);
    hasher.update(entry.body.join("\n").as_bytes());
    hasher.update([FIELD_SEPARATOR]);
    hasher.update(entry.source_file.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// What to do with one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Hash and identity both unseen.
    Create,
    /// Identical content already synced to `page_id`.
    Skip { page_id: String },
    /// Same identity synced before with different content.
    Update { page_id: String },
}

#[derive(Debug, Clone)]
struct Synced {
    content_hash: String,
    page_id: String,
}

/// In-memory view of the sync store.
#[derive(Debug, Default)]
pub struct SyncIndex {
    by_identity: HashMap<(String, String), Synced>,
    by_hash: HashMap<String, String>,
}

impl SyncIndex {
    pub fn from_records(records: &[SyncRecord]) -> Self {
        let mut index = Self::default();
        for record in records {
            index.insert(
                &record.title,
                &record.source_file,
                &record.content_hash,
                &record.remote_page_id,
            );
        }
        index
    }

    /// Decide for an entry. Pure: the index is not changed.
    pub fn decide(&self, title: &str, source_file: &str, hash: &str) -> Decision {
        if let Some(page_id) = self.by_hash.get(hash) {
            return Decision::Skip {
                page_id: page_id.clone(),
            };
        }
        match self
            .by_identity
            .get(&(title.to_string(), source_file.to_string()))
        {
            Some(prev) => Decision::Update {
                page_id: prev.page_id.clone(),
            },
            None => Decision::Create,
        }
    }

    /// Record a successful write, replacing whatever the identity held.
    pub fn insert(&mut self, title: &str, source_file: &str, hash: &str, page_id: &str) {
        let key = (title.to_string(), source_file.to_string());
        let synced = Synced {
            content_hash: hash.to_string(),
            page_id: page_id.to_string(),
        };
        if let Some(old) = self.by_identity.insert(key, synced) {
            self.by_hash.remove(&old.content_hash);
        }
        self.by_hash.insert(hash.to_string(), page_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }
}

/// Keep the first entry for each content hash. Returns the survivors and the
/// number dropped.
pub fn collapse_duplicates(entries: Vec<ClassifiedEntry>) -> (Vec<ClassifiedEntry>, usize) {
    let before = entries.len();
    let mut seen = HashSet::new();
    let unique: Vec<ClassifiedEntry> = entries
        .into_iter()
        .filter(|e| seen.insert(e.content_hash.clone()))
        .collect();
    let dropped = before - unique.len();
    (unique, dropped)
}
