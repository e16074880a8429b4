use std::path::PathBuf;

use serde::Deserialize;
use webtrail_types::Priority;

/// How a run's records are turned into report files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Directory under which one sub-directory per run is created.
    pub root: PathBuf,

    /// Keep narratives only for tests that ended with failures or an error.
    pub log_only_on_error: bool,

    /// Lowest priority written to a narrative. `None` reports everything.
    pub min_priority: Option<Priority>,

    /// Locale used to look up message templates, e.g. `de_DE`.
    pub locale: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            log_only_on_error: false,
            min_priority: None,
            locale: default_locale(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("target/webtrail-reports")
}

fn default_locale() -> String {
    "en".to_string()
}

impl ReportSettings {
    /// Returns `true` if records at `priority` belong in a narrative.
    pub fn reports(&self, priority: Priority) -> bool {
        self.min_priority.map_or(true, |min| priority.is_at_least(min))
    }
}
