//! Application configuration for memsync.
//!
//! User config lives at `~/.memsync/memsync.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MemsyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "memsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".memsync";

/// Placeholder shipped in templates; never a usable database id.
pub const DATABASE_ID_PLACEHOLDER: &str = "YOUR_NOTION_DATABASE_ID_HERE";

// ---------------------------------------------------------------------------
// Config structs (matching memsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where memory files live.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Remote database settings.
    #[serde(default)]
    pub notion: NotionConfig,

    /// Entry extraction settings.
    #[serde(default)]
    pub parser: ParserConfig,

    /// Size caps imposed by the remote service.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Additional classifier rules.
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// `[workspace]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace root; `~` is expanded.
    #[serde(default = "default_root")]
    pub root: String,

    /// Primary memory file, relative to the root.
    #[serde(default = "default_memory_file")]
    pub memory_file: String,

    /// Directory of dated `YYYY-MM-DD.md` files, relative to the root.
    #[serde(default = "default_memory_dir")]
    pub memory_dir: String,

    /// Append-only sync log, relative to the root.
    #[serde(default = "default_sync_log")]
    pub sync_log: String,

    /// Sync-record database, relative to the root.
    #[serde(default = "default_state_db")]
    pub state_db: String,

    /// How many days of dated files to read when `--since` is absent.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            memory_file: default_memory_file(),
            memory_dir: default_memory_dir(),
            sync_log: default_sync_log(),
            state_db: default_state_db(),
            lookback_days: default_lookback_days(),
        }
    }
}

fn default_root() -> String {
    "~/.openclaw/workspace".into()
}
fn default_memory_file() -> String {
    "MEMORY.md".into()
}
fn default_memory_dir() -> String {
    "memory".into()
}
fn default_sync_log() -> String {
    "memory/sync-log.md".into()
}
fn default_state_db() -> String {
    "memory/.memsync/sync.db".into()
}
fn default_lookback_days() -> u32 {
    7
}

/// `[notion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// File holding the integration token (never store the key itself here).
    #[serde(default = "default_api_key_path")]
    pub api_key_path: String,

    /// Name of the env var holding the database id.
    #[serde(default = "default_database_id_env")]
    pub database_id_env: String,

    /// Database id constant; overrides the env var when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,

    /// API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Value of the `Notion-Version` header.
    #[serde(default = "default_notion_version")]
    pub notion_version: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key_path: default_api_key_path(),
            database_id_env: default_database_id_env(),
            database_id: None,
            api_base: default_api_base(),
            notion_version: default_notion_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_path() -> String {
    "~/.config/notion/api_key".into()
}
fn default_database_id_env() -> String {
    "NOTION_DATABASE_ID".into()
}
fn default_api_base() -> String {
    "https://api.notion.com/v1".into()
}
fn default_notion_version() -> String {
    "2025-09-03".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[parser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Heading level that starts an entry.
    #[serde(default = "default_entry_level")]
    pub entry_heading_level: u8,

    /// Heading level of enclosing sections (0 disables section filtering).
    #[serde(default = "default_section_level")]
    pub section_heading_level: u8,

    /// Keep text before the first entry heading as its own entry.
    #[serde(default)]
    pub keep_preamble: bool,

    /// Section keywords that qualify in the primary memory file.
    #[serde(default = "default_memory_sections")]
    pub memory_sections: Vec<String>,

    /// Section keywords that qualify in daily files.
    #[serde(default = "default_daily_sections")]
    pub daily_sections: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            entry_heading_level: default_entry_level(),
            section_heading_level: default_section_level(),
            keep_preamble: false,
            memory_sections: default_memory_sections(),
            daily_sections: default_daily_sections(),
        }
    }
}

fn default_entry_level() -> u8 {
    3
}
fn default_section_level() -> u8 {
    2
}
fn default_memory_sections() -> Vec<String> {
    ["standard", "protocol", "lesson", "framework"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_daily_sections() -> Vec<String> {
    [
        "research",
        "finding",
        "lesson",
        "decision",
        "insight",
        "pattern",
        "key takeaway",
        "benchmark",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `[limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Max characters of the `Body` rich-text property.
    #[serde(default = "default_max_body_length")]
    pub max_body_length: usize,

    /// Max characters of the `Name` title property.
    #[serde(default = "default_max_title_length")]
    pub max_title_length: usize,

    /// Max number of tags per entry.
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,

    /// Max page-content blocks per page (truncation marker included).
    #[serde(default = "default_max_blocks")]
    pub max_blocks: usize,

    /// Max total characters across page-content blocks.
    #[serde(default = "default_max_block_chars")]
    pub max_block_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_length: default_max_body_length(),
            max_title_length: default_max_title_length(),
            max_tags: default_max_tags(),
            max_blocks: default_max_blocks(),
            max_block_chars: default_max_block_chars(),
        }
    }
}

fn default_max_body_length() -> usize {
    2000
}
fn default_max_title_length() -> usize {
    100
}
fn default_max_tags() -> usize {
    7
}
fn default_max_blocks() -> usize {
    100
}
fn default_max_block_chars() -> usize {
    20_000
}

/// `[classifier]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Domain rules appended after the built-in table.
    #[serde(default)]
    pub extra_domains: Vec<KeywordRule>,

    /// Tag rules appended after the built-in table.
    #[serde(default)]
    pub extra_tags: Vec<KeywordRule>,
}

/// `{ name, keywords }`: `name` is assigned when any keyword occurs in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub name: String,
    pub keywords: Vec<String>,
}

// ---------------------------------------------------------------------------
// Resolved workspace paths
// ---------------------------------------------------------------------------

/// Absolute locations derived from `[workspace]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub memory_file: PathBuf,
    pub memory_dir: PathBuf,
    pub sync_log: PathBuf,
    pub state_db: PathBuf,
}

impl WorkspaceConfig {
    /// Resolve all workspace paths, expanding `~` in the root.
    pub fn paths(&self) -> Result<WorkspacePaths> {
        let root = expand_tilde(&self.root)?;
        Ok(WorkspacePaths {
            memory_file: root.join(&self.memory_file),
            memory_dir: root.join(&self.memory_dir),
            sync_log: root.join(&self.sync_log),
            state_db: root.join(&self.state_db),
            root,
        })
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| MemsyncError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None if path == "~" => {
            dirs::home_dir().ok_or_else(|| MemsyncError::config("could not determine home directory"))
        }
        None => Ok(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.memsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| MemsyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.memsync/memsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MemsyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MemsyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file to `path` (or the default location).
/// Returns the path to the created file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| MemsyncError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MemsyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MemsyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

// ---------------------------------------------------------------------------
// Startup validation
// ---------------------------------------------------------------------------

/// Resolve the database id: the config constant wins over the env var value.
///
/// `env_value` is the already-read value of `config.notion.database_id_env`, so
/// callers (and tests) never need to mutate the process environment.
pub fn resolve_database_id(config: &AppConfig, env_value: Option<String>) -> Result<String> {
    let var_name = &config.notion.database_id_env;
    let raw = config
        .notion
        .database_id
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or(env_value.filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| {
            MemsyncError::config(format!(
                "database id not set. Set the {var_name} environment variable \
                 or `notion.database_id` in the config file."
            ))
        })?;

    let raw = raw.trim();
    if raw == DATABASE_ID_PLACEHOLDER {
        return Err(MemsyncError::config(format!(
            "database id is still the placeholder '{DATABASE_ID_PLACEHOLDER}'"
        )));
    }

    Uuid::parse_str(raw)
        .map(|id| id.simple().to_string())
        .map_err(|e| MemsyncError::config(format!("invalid database id '{raw}': {e}")))
}

/// Read the API key from `path`. A missing or empty file is a credential error.
pub fn read_api_key(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MemsyncError::credential(format!("API key not found at {}: {e}", path.display()))
    })?;
    let key = content.trim();
    if key.is_empty() {
        return Err(MemsyncError::credential(format!(
            "API key file {} is empty",
            path.display()
        )));
    }
    Ok(key.to_string())
}
