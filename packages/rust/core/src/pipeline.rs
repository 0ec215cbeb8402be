//! End-to-end sync pipeline: files → entries → classify → dedup → remote → store → log.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use memsync_discovery::MemoryFile;
use memsync_markdown::{ConvertOptions, parse_inline, truncate_body, truncate_chars};
use memsync_notion::{PageProperties, RemoteWriter};
use memsync_shared::{
    Block, ClassifiedEntry, Entry, LimitsConfig, MemsyncError, ParserConfig, Result, SyncAction,
    SyncLogLine, SyncRecord, SyncSummary,
};
use memsync_storage::{SyncLog, SyncStore};

use crate::classify::Classifier;
use crate::dedup::{Decision, SyncIndex, collapse_duplicates};

/// Bodies this short carry no `Body` property and no page content.
const SHORT_BODY_CHARS: usize = 50;

/// Page id recorded in the in-run index for dry-run creations.
const DRY_RUN_PAGE_ID: &str = "dry-run";

static BARE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>()\[\]"']+"#).expect("bare url regex"));

// ---------------------------------------------------------------------------
// Config, results, progress
// ---------------------------------------------------------------------------

/// Runtime options for one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Compute and log every decision without remote writes or store updates.
    pub dry_run: bool,
    /// Cap on entries processed, applied after in-run duplicate suppression.
    pub limit: Option<usize>,
    pub limits: LimitsConfig,
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub summary: SyncSummary,
    /// Entries dropped because an earlier entry in the same run had the same hash.
    pub duplicates: usize,
    pub dry_run: bool,
    pub elapsed: Duration,
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub action: SyncAction,
    pub detail: String,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each entry is fully processed.
    fn entry_done(&self, title: &str, action: SyncAction, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &SyncReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn entry_done(&self, _title: &str, _action: SyncAction, _current: usize, _total: usize) {}
    fn done(&self, _report: &SyncReport) {}
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one sync run over its collaborators.
pub struct SyncOrchestrator<'a> {
    config: SyncConfig,
    classifier: Classifier,
    remote: &'a dyn RemoteWriter,
    store: &'a dyn SyncStore,
    log: &'a dyn SyncLog,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        config: SyncConfig,
        classifier: Classifier,
        remote: &'a dyn RemoteWriter,
        store: &'a dyn SyncStore,
        log: &'a dyn SyncLog,
    ) -> Self {
        Self {
            config,
            classifier,
            remote,
            store,
            log,
        }
    }

    /// Read the discovered files and sync their entries.
    ///
    /// An unreadable primary file is fatal; unreadable daily files are skipped.
    pub async fn sync_files(
        &self,
        files: &[MemoryFile],
        parser: &ParserConfig,
        progress: &dyn ProgressReporter,
    ) -> Result<SyncReport> {
        progress.phase("Reading memory files");
        let entries = memsync_discovery::read_all_entries(files, parser)?;
        info!(files = files.len(), entries = entries.len(), "entries extracted");
        self.sync_entries(entries, progress).await
    }

    /// Classify, deduplicate and write `entries`.
    ///
    /// Per-entry failures are counted and logged; only a failure to load the
    /// sync store aborts the run.
    #[instrument(skip_all, fields(entries = entries.len(), dry_run = self.config.dry_run))]
    pub async fn sync_entries(
        &self,
        entries: Vec<Entry>,
        progress: &dyn ProgressReporter,
    ) -> Result<SyncReport> {
        let start = Instant::now();

        // --- Phase 1: Classify ---
        progress.phase("Classifying entries");
        let classified: Vec<ClassifiedEntry> = entries
            .into_iter()
            .map(|e| self.classifier.classify(e))
            .collect();

        // --- Phase 2: In-run duplicates, then limit ---
        let (mut unique, duplicates) = collapse_duplicates(classified);
        if duplicates > 0 {
            debug!(duplicates, "dropped entries repeated within this run");
        }
        if let Some(limit) = self.config.limit {
            unique.truncate(limit);
        }

        // --- Phase 3: Load sync state ---
        progress.phase("Loading sync state");
        let mut index = SyncIndex::from_records(&self.store.load_all().await?);
        debug!(known = index.len(), "sync state loaded");

        // --- Phase 4: Process entries ---
        progress.phase(if self.config.dry_run {
            "Planning sync (dry run)"
        } else {
            "Syncing entries"
        });
        let total = unique.len();
        let mut summary = SyncSummary::default();

        for (i, entry) in unique.iter().enumerate() {
            let outcome = match self.process_entry(entry, &mut index).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(title = %entry.entry.title, source_file = %entry.entry.source_file, error = %e, "entry failed");
                    EntryOutcome {
                        action: SyncAction::Failed,
                        detail: e.to_string(),
                    }
                }
            };

            summary.record(outcome.action);
            self.append_log(&entry.entry.title, &outcome);
            progress.entry_done(&entry.entry.title, outcome.action, i + 1, total);
        }

        let report = SyncReport {
            summary,
            duplicates,
            dry_run: self.config.dry_run,
            elapsed: start.elapsed(),
        };
        info!(
            processed = summary.processed,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "sync finished"
        );
        progress.done(&report);
        Ok(report)
    }

    /// Decide, write and record one entry.
    async fn process_entry(
        &self,
        entry: &ClassifiedEntry,
        index: &mut SyncIndex,
    ) -> Result<EntryOutcome> {
        let title = &entry.entry.title;
        let source_file = &entry.entry.source_file;
        let decision = index.decide(title, source_file, &entry.content_hash);

        if let Decision::Skip { page_id } = &decision {
            debug!(%title, %page_id, "unchanged, skipping");
            let detail = format!("unchanged, page {page_id}");
            return Ok(EntryOutcome {
                action: SyncAction::Skipped,
                detail: self.dry_run_detail(detail),
            });
        }

        let (properties, blocks) = build_page(entry, &self.config.limits);

        if self.config.dry_run {
            log_dry_run(entry, &decision, &properties, &blocks);
            let (action, detail, page_id) = match &decision {
                Decision::Update { page_id } => (
                    SyncAction::Updated,
                    format!("would update page {page_id}"),
                    page_id.as_str(),
                ),
                _ => (
                    SyncAction::Created,
                    "would create page".to_string(),
                    DRY_RUN_PAGE_ID,
                ),
            };
            index.insert(title, source_file, &entry.content_hash, page_id);
            return Ok(EntryOutcome {
                action,
                detail: self.dry_run_detail(detail),
            });
        }

        let (action, page_id) = match decision {
            Decision::Update { page_id } => {
                self.remote
                    .update_page(&page_id, &properties, &blocks)
                    .await?;
                (SyncAction::Updated, page_id)
            }
            _ => {
                let page_id = self.remote.create_page(&properties, &blocks).await?;
                (SyncAction::Created, page_id)
            }
        };

        self.store
            .upsert(&SyncRecord {
                title: title.clone(),
                source_file: source_file.clone(),
                content_hash: entry.content_hash.clone(),
                remote_page_id: page_id.clone(),
                last_synced_at: Utc::now(),
            })
            .await
            .map_err(|e| {
                let verb = if action == SyncAction::Created { "created" } else { "updated" };
                MemsyncError::Storage(format!(
                    "{verb} page {page_id} but state write failed: {e}"
                ))
            })?;
        index.insert(title, source_file, &entry.content_hash, &page_id);

        info!(%title, %source_file, %page_id, action = %action, "entry synced");
        Ok(EntryOutcome {
            action,
            detail: format!("page {page_id}"),
        })
    }

    fn dry_run_detail(&self, detail: String) -> String {
        if self.config.dry_run {
            format!("dry-run: {detail}")
        } else {
            detail
        }
    }

    /// Append to the audit log. A log failure never changes the entry's outcome.
    fn append_log(&self, title: &str, outcome: &EntryOutcome) {
        let line = SyncLogLine {
            timestamp: Local::now().naive_local(),
            action: outcome.action,
            title: title.to_string(),
            detail: outcome.detail.clone(),
        };
        if let Err(e) = self.log.append(&line) {
            warn!(%title, error = %e, "failed to append sync log line");
        }
    }
}

// ---------------------------------------------------------------------------
// Page building
// ---------------------------------------------------------------------------

/// Build the properties and page content for an entry.
pub fn build_page(entry: &ClassifiedEntry, limits: &LimitsConfig) -> (PageProperties, Vec<Block>) {
    let body = entry.entry.body_text();
    let has_body = body.trim().chars().count() > SHORT_BODY_CHARS;

    let blocks = if has_body {
        memsync_markdown::convert(&entry.entry.body, &ConvertOptions::from(limits)).blocks
    } else {
        Vec::new()
    };

    let properties = PageProperties {
        title: truncate_chars(&entry.entry.title, limits.max_title_length),
        content_type: entry.content_type,
        domain: entry.domain.clone(),
        certainty: entry.certainty,
        source: entry.entry.source,
        confidence_score: entry.confidence_score,
        impact: entry.impact,
        tags: entry.tags.clone(),
        external_url: first_link(&entry.entry.body),
        body: has_body.then(|| truncate_body(body.trim(), limits.max_body_length)),
        source_file: entry.entry.source_file.clone(),
    };
    (properties, blocks)
}

/// First `http(s)` link in the body, Markdown link or bare URL.
pub fn first_link(lines: &[String]) -> Option<String> {
    lines.iter().find_map(|line| {
        let linked = parse_inline(line).into_iter().find_map(|span| span.link);
        linked.or_else(|| {
            BARE_URL_RE.find_iter(line).find_map(|m| {
                let candidate = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
                Url::parse(candidate).ok().map(|u| u.to_string())
            })
        })
    })
}

fn log_dry_run(
    entry: &ClassifiedEntry,
    decision: &Decision,
    properties: &PageProperties,
    blocks: &[Block],
) {
    let action = match decision {
        Decision::Update { .. } => "update",
        _ => "create",
    };
    info!(
        title = %entry.entry.title,
        source_file = %entry.entry.source_file,
        action,
        content_type = entry.content_type.as_str(),
        domain = %entry.domain,
        confidence = entry.confidence_score,
        impact = entry.impact.as_str(),
        tags = ?entry.tags,
        body_chars = entry.entry.body_text().chars().count(),
        body_property = properties.body.is_some(),
        blocks = blocks.len(),
        "dry run"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use memsync_markdown::TRUNCATION_INDICATOR;
    use memsync_shared::{ContentType, EntrySource};
    use memsync_storage::{MemoryLog, MemoryStore};

    use crate::classify::KeywordTables;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Create(String),
        Update(String, String),
    }

    /// Records calls; fails any write whose title is listed in `fail`.
    #[derive(Default)]
    struct FakeRemote {
        fail: Vec<String>,
        calls: Mutex<Vec<Call>>,
        pages: Mutex<Vec<PageProperties>>,
    }

    impl FakeRemote {
        fn failing(titles: &[&str]) -> Self {
            Self {
                fail: titles.iter().map(|t| t.to_string()).collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn check(&self, props: &PageProperties) -> Result<()> {
            self.pages.lock().unwrap().push(props.clone());
            if self.fail.contains(&props.title) {
                return Err(MemsyncError::Remote {
                    status: 400,
                    code: "validation_error".into(),
                    message: format!("rejected {}", props.title),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteWriter for FakeRemote {
        async fn create_page(&self, props: &PageProperties, _blocks: &[Block]) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Create(props.title.clone()));
            self.check(props)?;
            Ok(format!("page-{}", props.title))
        }

        async fn update_page(
            &self,
            page_id: &str,
            props: &PageProperties,
            _blocks: &[Block],
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(page_id.to_string(), props.title.clone()));
            self.check(props)
        }
    }

    fn entry(title: &str, body: &str) -> Entry {
        Entry {
            title: title.into(),
            body: body.lines().map(String::from).collect(),
            source_file: "2026-03-14.md".into(),
            source_date: None,
            section: Some("Research".into()),
            source: EntrySource::Daily,
            unparsed: false,
        }
    }

    fn long_body(tag: &str) -> String {
        format!("{tag}: this body is comfortably longer than fifty characters of text.")
    }

    fn config(dry_run: bool, limit: Option<usize>) -> SyncConfig {
        SyncConfig {
            dry_run,
            limit,
            limits: LimitsConfig::default(),
        }
    }

    async fn run(
        cfg: SyncConfig,
        remote: &FakeRemote,
        store: &MemoryStore,
        log: &MemoryLog,
        entries: Vec<Entry>,
    ) -> SyncReport {
        let classifier = Classifier::new(KeywordTables::default(), &cfg.limits);
        SyncOrchestrator::new(cfg, classifier, remote, store, log)
            .sync_entries(entries, &SilentProgress)
            .await
            .expect("run")
    }

    fn five_entries() -> Vec<Entry> {
        (1..=5)
            .map(|i| entry(&format!("Entry {i}"), &long_body(&i.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn limit_caps_entries_reaching_remote() {
        let (remote, store, log) = (FakeRemote::default(), MemoryStore::new(), MemoryLog::new());
        let report = run(config(false, Some(2)), &remote, &store, &log, five_entries()).await;

        assert_eq!(report.summary.processed, 2);
        assert_eq!(report.summary.created, 2);
        assert_eq!(
            remote.calls(),
            vec![
                Call::Create("Entry 1".into()),
                Call::Create("Entry 2".into())
            ]
        );
        assert_eq!(store.records().len(), 2);
        assert_eq!(log.read_all().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn one_failing_write_does_not_stop_the_run() {
        let remote = FakeRemote::failing(&["Entry 2"]);
        let (store, log) = (MemoryStore::new(), MemoryLog::new());
        let report = run(config(false, None), &remote, &store, &log, five_entries()).await;

        assert_eq!(report.summary.processed, 5);
        assert_eq!(report.summary.created, 4);
        assert_eq!(report.summary.failed, 1);
        assert!(report.summary.has_failures());
        assert_eq!(remote.calls().len(), 5);

        let lines = log.read_all().unwrap();
        let failed = lines
            .iter()
            .find(|l| l.action == SyncAction::Failed)
            .expect("failed line");
        assert_eq!(failed.title, "Entry 2");
        assert!(failed.detail.contains("rejected Entry 2"));
        // Nothing stored for the failed entry.
        assert!(store.records().iter().all(|r| r.title != "Entry 2"));
    }

    #[tokio::test]
    async fn rerun_on_unchanged_input_is_idempotent() {
        let (store, log) = (MemoryStore::new(), MemoryLog::new());

        let first = FakeRemote::default();
        let report = run(config(false, None), &first, &store, &log, five_entries()).await;
        assert_eq!(report.summary.created, 5);

        let second = FakeRemote::default();
        let report = run(config(false, None), &second, &store, &log, five_entries()).await;
        assert_eq!(report.summary.created, 0);
        assert_eq!(report.summary.updated, 0);
        assert_eq!(report.summary.skipped, 5);
        assert!(second.calls().is_empty());
    }

    #[tokio::test]
    async fn changed_body_updates_same_page() {
        let (store, log) = (MemoryStore::new(), MemoryLog::new());
        let title = "Decision: Use Postgres";

        let first = FakeRemote::default();
        run(
            config(false, None),
            &first,
            &store,
            &log,
            vec![entry(title, "We decided on Postgres because we need transactions.")],
        )
        .await;
        let page_id = store.records()[0].remote_page_id.clone();
        let old_hash = store.records()[0].content_hash.clone();

        let second = FakeRemote::default();
        let report = run(
            config(false, None),
            &second,
            &store,
            &log,
            vec![entry(title, "We decided on Postgres because we need JSONB and transactions.")],
        )
        .await;

        assert_eq!(report.summary.updated, 1);
        assert_eq!(report.summary.created, 0);
        assert_eq!(second.calls(), vec![Call::Update(page_id.clone(), title.into())]);

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].remote_page_id, page_id);
        assert_ne!(records[0].content_hash, old_hash);

        let page = &second.pages.lock().unwrap()[0];
        assert_eq!(page.content_type, ContentType::Decision);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing_but_logs_decisions() {
        let (remote, store, log) = (FakeRemote::default(), MemoryStore::new(), MemoryLog::new());
        let report = run(config(true, None), &remote, &store, &log, five_entries()).await;

        assert!(report.dry_run);
        assert_eq!(report.summary.created, 5);
        assert!(remote.calls().is_empty());
        assert!(store.records().is_empty());

        let lines = log.read_all().unwrap();
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|l| l.detail.starts_with("dry-run:")));
    }

    #[tokio::test]
    async fn duplicates_collapse_before_limit() {
        let (remote, store, log) = (FakeRemote::default(), MemoryStore::new(), MemoryLog::new());
        let dup = entry("Same", &long_body("same"));
        let entries = vec![dup.clone(), dup, entry("Other", &long_body("other"))];

        let report = run(config(false, Some(2)), &remote, &store, &log, entries).await;
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.summary.created, 2);
        assert_eq!(
            remote.calls(),
            vec![Call::Create("Same".into()), Call::Create("Other".into())]
        );
    }

    #[tokio::test]
    async fn store_failure_at_load_is_fatal() {
        struct BrokenStore;

        #[async_trait]
        impl SyncStore for BrokenStore {
            async fn load_all(&self) -> Result<Vec<SyncRecord>> {
                Err(MemsyncError::Storage("database is locked".into()))
            }
            async fn upsert(&self, _record: &SyncRecord) -> Result<()> {
                Ok(())
            }
        }

        let remote = FakeRemote::default();
        let log = MemoryLog::new();
        let cfg = config(false, None);
        let classifier = Classifier::new(KeywordTables::default(), &cfg.limits);
        let result = SyncOrchestrator::new(cfg, classifier, &remote, &BrokenStore, &log)
            .sync_entries(five_entries(), &SilentProgress)
            .await;
        assert!(matches!(result, Err(MemsyncError::Storage(_))));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn state_write_failure_reports_the_remote_page() {
        struct ReadOnlyStore;

        #[async_trait]
        impl SyncStore for ReadOnlyStore {
            async fn load_all(&self) -> Result<Vec<SyncRecord>> {
                Ok(Vec::new())
            }
            async fn upsert(&self, _record: &SyncRecord) -> Result<()> {
                Err(MemsyncError::Storage("disk full".into()))
            }
        }

        let remote = FakeRemote::default();
        let log = MemoryLog::new();
        let cfg = config(false, None);
        let classifier = Classifier::new(KeywordTables::default(), &cfg.limits);
        let report = SyncOrchestrator::new(cfg, classifier, &remote, &ReadOnlyStore, &log)
            .sync_entries(vec![entry("Orphan", &long_body("o"))], &SilentProgress)
            .await
            .expect("run");

        assert_eq!(report.summary.failed, 1);
        let lines = log.read_all().unwrap();
        assert_eq!(lines[0].action, SyncAction::Failed);
        assert!(lines[0].detail.contains("created page page-Orphan"));
        assert!(lines[0].detail.contains("disk full"));
    }

    #[test]
    fn short_bodies_get_no_body_or_blocks() {
        let classifier = Classifier::new(KeywordTables::default(), &LimitsConfig::default());
        let c = classifier.classify(entry("Tiny", "just a note"));
        let (props, blocks) = build_page(&c, &LimitsConfig::default());
        assert!(props.body.is_none());
        assert!(blocks.is_empty());
    }

    #[test]
    fn long_body_property_is_truncated_with_indicator() {
        let limits = LimitsConfig::default();
        let classifier = Classifier::new(KeywordTables::default(), &limits);
        let body = "word ".repeat(1000);
        let c = classifier.classify(entry("Big", &body));
        let (props, blocks) = build_page(&c, &limits);

        let body = props.body.expect("body property");
        assert!(body.chars().count() <= limits.max_body_length);
        assert!(body.ends_with(TRUNCATION_INDICATOR));
        assert!(!blocks.is_empty());
    }

    #[test]
    fn title_is_capped() {
        let limits = LimitsConfig::default();
        let classifier = Classifier::new(KeywordTables::default(), &limits);
        let c = classifier.classify(entry(&"t".repeat(150), "body"));
        let (props, _) = build_page(&c, &limits);
        assert_eq!(props.title.chars().count(), limits.max_title_length);
    }

    #[test]
    fn first_link_prefers_earliest_line() {
        let lines: Vec<String> = vec![
            "no link here".into(),
            "see https://example.com/a, then".into(),
            "[docs](https://example.com/b)".into(),
        ];
        assert_eq!(first_link(&lines).as_deref(), Some("https://example.com/a"));

        let md: Vec<String> = vec!["read [the docs](https://example.com/b) first".into()];
        assert_eq!(first_link(&md).as_deref(), Some("https://example.com/b"));

        assert_eq!(first_link(&["ftp://x".to_string()]), None);
    }

    #[tokio::test]
    async fn sync_files_reads_discovered_files() {
        let root = std::env::temp_dir().join(format!("memsync_core_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&root).unwrap();
        let path = root.join("MEMORY.md");
        std::fs::write(
            &path,
            "# Memory\n\n## Lessons\n\n### Pin versions\n\nAlways pin dependency versions in CI so builds stay reproducible.\n\n## Misc\n\n### Ignored\n\nNot in a qualifying section, so this entry is never synced anywhere.\n",
        )
        .unwrap();

        let files = vec![MemoryFile {
            path,
            file_name: "MEMORY.md".into(),
            date: None,
            source: EntrySource::MemoryFile,
        }];

        let (remote, store, log) = (FakeRemote::default(), MemoryStore::new(), MemoryLog::new());
        let cfg = config(false, None);
        let classifier = Classifier::new(KeywordTables::default(), &cfg.limits);
        let report = SyncOrchestrator::new(cfg, classifier, &remote, &store, &log)
            .sync_files(&files, &ParserConfig::default(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.summary.created, 1);
        assert_eq!(remote.calls(), vec![Call::Create("Pin versions".into())]);
        let page = &remote.pages.lock().unwrap()[0];
        assert_eq!(page.source, EntrySource::MemoryFile);
        assert_eq!(page.source_file, "MEMORY.md");
        let _ = std::fs::remove_dir_all(&root);
    }
}
