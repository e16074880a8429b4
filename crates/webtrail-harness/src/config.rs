//! Harness configuration loading from file and environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use webtrail_db::DbRuntimeSettings;
use webtrail_events::MAX_BATCH_SIZE;
use webtrail_logger::PriorityConfiguration;
use webtrail_report::{CatalogError, MessageCatalog, ReportSettings};
use webtrail_types::{EventSource, Priority};

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Event database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log and screenshot thresholds.
    #[serde(default)]
    pub priorities: PrioritySettings,

    /// Report generation settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Diagnostic logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Event database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    /// Buffered inserts before the batch is executed.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Thresholds applied to a fresh [`PriorityConfiguration`].
#[derive(Debug, Clone, Deserialize)]
pub struct PrioritySettings {
    /// Log threshold of every source.
    #[serde(default = "default_priority")]
    pub default: Priority,

    /// Screenshot threshold of every source. Mirrors `default` when unset.
    #[serde(default)]
    pub default_screenshot: Option<Priority>,

    /// Per group or per item thresholds.
    #[serde(default)]
    pub overrides: Vec<PriorityOverride>,
}

/// One `[[priorities.overrides]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PriorityOverride {
    /// Source the override applies to.
    pub source: EventSource,
    /// Narrows the override to one test class.
    #[serde(default)]
    pub group: Option<String>,
    /// Narrows it further to one method; ignored without `group`.
    #[serde(default)]
    pub item: Option<String>,
    /// Log threshold for the key.
    #[serde(default)]
    pub log: Option<Priority>,
    /// Screenshot threshold for the key.
    #[serde(default)]
    pub screenshot: Option<Priority>,
}

/// Report generation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Whether the markdown report is generated when the run finishes.
    pub enabled: bool,

    #[serde(flatten)]
    pub settings: ReportSettings,

    /// Extra message bundles, loaded on top of the built-in one.
    pub bundles: Vec<BundleConfig>,
}

/// A message bundle file for one locale.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleConfig {
    /// Locale the bundle serves, e.g. `de` or `de_DE`.
    pub locale: String,
    /// TOML file with the message templates.
    pub path: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "webtrail_events=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_db_path() -> String {
    "webtrail.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    DbRuntimeSettings::default().busy_timeout_ms
}

fn default_pool_max_size() -> u32 {
    DbRuntimeSettings::default().pool_max_size
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_priority() -> Priority {
    Priority::Documentation
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for PrioritySettings {
    fn default() -> Self {
        Self {
            default: default_priority(),
            default_screenshot: None,
            overrides: Vec::new(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settings: ReportSettings::default(),
            bundles: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl StorageConfig {
    /// Pool settings derived from this section.
    pub fn runtime_settings(&self) -> DbRuntimeSettings {
        DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
        }
    }
}

impl PrioritySettings {
    /// Seeds `priorities` with the defaults, then installs every override in
    /// file order.
    pub fn apply(&self, priorities: &PriorityConfiguration) {
        if let Some(screenshot) = self.default_screenshot {
            priorities.set_default_screenshot_priority(screenshot);
        }
        priorities.set_default_priority(self.default);

        for entry in &self.overrides {
            let group = entry.group.as_deref();
            let item = entry.item.as_deref();
            if let Some(log) = entry.log {
                priorities.set_priority(log, entry.source, group, item);
            }
            if let Some(screenshot) = entry.screenshot {
                priorities.set_screenshot_priority(screenshot, entry.source, group, item);
            }
        }
    }
}

impl ReportConfig {
    /// The built-in messages plus the configured bundles.
    pub fn catalog(&self) -> Result<MessageCatalog, CatalogError> {
        let mut catalog = MessageCatalog::builtin();
        for bundle in &self.bundles {
            catalog.load_toml_file(&bundle.locale, &bundle.path)?;
        }
        Ok(catalog)
    }
}

/// Errors raised by [`load_config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Reads the TOML file at `path`, then applies environment overrides.
///
/// A missing file, or no path at all, yields the defaults. Recognised
/// variables are `WEBTRAIL_DB_PATH`, `WEBTRAIL_REPORT_ROOT`,
/// `WEBTRAIL_LOG_LEVEL` and `WEBTRAIL_LOG_JSON` (`true` or `1`).
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = path.map(Path::new).map_or(Ok(Config::default()), read_file)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::FileRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Applies the `WEBTRAIL_*` overrides, reading variables through `var`.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(db_path) = var("WEBTRAIL_DB_PATH") {
        config.storage.path = db_path;
    }
    if let Some(root) = var("WEBTRAIL_REPORT_ROOT") {
        config.report.settings.root = PathBuf::from(root);
    }
    if let Some(level) = var("WEBTRAIL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("WEBTRAIL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
