//! Application configuration for newsreader.
//!
//! User config lives at `~/.newsreader/newsreader.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NewsReaderError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "newsreader.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".newsreader";

// ---------------------------------------------------------------------------
// Config structs (matching newsreader.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Durable event log shared by all stages.
    #[serde(default)]
    pub event_log: EventLogConfig,

    /// Inference server used by the enrichment processors.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Search index the archiver writes to.
    #[serde(default)]
    pub search: SearchConfig,

    /// Collection stage settings.
    #[serde(default)]
    pub collector: CollectorSettings,

    /// Operator stage settings.
    #[serde(default)]
    pub operator: OperatorSettings,

    /// News sources crawled by the collection stage.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// `[event_log]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogConfig {
    /// Path of the libSQL database file.
    #[serde(default = "default_event_log_path")]
    pub path: String,

    /// Events read per query while consuming.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Upper bound for a single append.
    #[serde(default = "default_event_log_timeout")]
    pub timeout_secs: u64,

    /// Poll interval when following the log for new events.
    #[serde(default = "default_follow_interval")]
    pub follow_interval_ms: u64,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            path: default_event_log_path(),
            batch_size: default_batch_size(),
            timeout_secs: default_event_log_timeout(),
            follow_interval_ms: default_follow_interval(),
        }
    }
}

fn default_event_log_path() -> String {
    "~/.newsreader/events.db".into()
}
fn default_batch_size() -> u64 {
    30
}
fn default_event_log_timeout() -> u64 {
    10
}
fn default_follow_interval() -> u64 {
    1000
}

/// `[inference]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// `host:port` of the inference server.
    #[serde(default = "default_inference_addr")]
    pub addr: String,

    #[serde(default = "default_summary_timeout")]
    pub summary_timeout_secs: u64,

    #[serde(default = "default_ner_timeout")]
    pub ner_timeout_secs: u64,

    /// Longest body prefix (in bytes) sent to the NER model.
    #[serde(default = "default_ner_max_len")]
    pub ner_max_len: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            addr: default_inference_addr(),
            summary_timeout_secs: default_summary_timeout(),
            ner_timeout_secs: default_ner_timeout(),
            ner_max_len: default_ner_max_len(),
        }
    }
}

fn default_inference_addr() -> String {
    "localhost:8080".into()
}
fn default_summary_timeout() -> u64 {
    120
}
fn default_ner_timeout() -> u64 {
    30
}
fn default_ner_max_len() -> usize {
    512
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search cluster.
    #[serde(default = "default_search_url")]
    pub url: String,

    /// Index articles are written to.
    #[serde(default = "default_search_index")]
    pub index: String,

    /// Name of the env var holding the user name (never store the value itself).
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Name of the env var holding the password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Accept self-signed certificates.
    #[serde(default = "default_true")]
    pub insecure_tls: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            index: default_search_index(),
            username_env: default_username_env(),
            password_env: default_password_env(),
            insecure_tls: true,
        }
    }
}

fn default_search_url() -> String {
    "https://localhost:9200".into()
}
fn default_search_index() -> String {
    "article-1".into()
}
fn default_username_env() -> String {
    "OS_USER".into()
}
fn default_password_env() -> String {
    "OS_PWD".into()
}
fn default_true() -> bool {
    true
}

/// `[collector]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSettings {
    #[serde(default = "default_one")]
    pub num_workers: usize,

    /// Pause between two collection runs.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Total time the collect command keeps running.
    #[serde(default = "default_run_for")]
    pub run_for_secs: u64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            num_workers: default_one(),
            interval_secs: default_interval(),
            run_for_secs: default_run_for(),
        }
    }
}

fn default_one() -> usize {
    1
}
fn default_interval() -> u64 {
    2 * 60 * 60
}
fn default_run_for() -> u64 {
    48 * 60 * 60
}

/// `[operator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSettings {
    /// Workers of the preprocessing stage.
    #[serde(default = "default_two")]
    pub num_workers: usize,

    /// Workers of the archiving stage.
    #[serde(default = "default_two")]
    pub archive_workers: usize,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            num_workers: default_two(),
            archive_workers: default_two(),
        }
    }
}

fn default_two() -> usize {
    2
}

/// `[[sources]]` entry: one site crawled through CSS selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name used in logs and errors.
    pub name: String,
    /// Overview page the article links are taken from.
    pub start_url: String,
    /// Selects the links to article pages on the overview page.
    pub link_selector: String,
    /// Present only on article pages; pages without it are skipped.
    pub article_selector: String,
    pub title_selector: String,
    pub created_selector: String,
    /// Every match is one body paragraph.
    pub body_selector: String,
    pub tags_selector: String,
    /// Stop after this many article links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_articles: Option<usize>,
    /// Delay before each article request.
    #[serde(default)]
    pub rate_limit_ms: u64,
}

// ---------------------------------------------------------------------------
// Runtime views
// ---------------------------------------------------------------------------

impl EventLogConfig {
    /// The database path with a leading `~/` expanded.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        expand_home(&self.path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn follow_interval(&self) -> Duration {
        Duration::from_millis(self.follow_interval_ms)
    }
}

impl InferenceConfig {
    pub fn summary_timeout(&self) -> Duration {
        Duration::from_secs(self.summary_timeout_secs)
    }

    pub fn ner_timeout(&self) -> Duration {
        Duration::from_secs(self.ner_timeout_secs)
    }
}

impl SearchConfig {
    /// Read `(username, password)` from the configured env vars.
    pub fn credentials(&self) -> Result<(String, String)> {
        Ok((
            read_env(&self.username_env, "search user name")?,
            read_env(&self.password_env, "search password")?,
        ))
    }
}

impl CollectorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn run_for(&self) -> Duration {
        Duration::from_secs(self.run_for_secs)
    }
}

fn read_env(var_name: &str, what: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(NewsReaderError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}

fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| NewsReaderError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.newsreader/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NewsReaderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.newsreader/newsreader.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| NewsReaderError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        NewsReaderError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NewsReaderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NewsReaderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NewsReaderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
