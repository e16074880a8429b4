//! Cascading log and screenshot thresholds.
//!
//! Thresholds live in two independent maps keyed by `SOURCE`,
//! `SOURCE.group` or `SOURCE.group.item`. A lookup for a full key that has
//! never been seen resolves through the group key to the source default and
//! caches the result under both the group and the full key, so repeated
//! lookups from the same call site are a single map read.
//!
//! Overrides installed after a key was first resolved only affect keys that
//! are written directly; cached entries keep the value they saw first.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use webtrail_types::{EventSource, Priority};

use crate::error::LoggerError;

type PriorityMap = RwLock<HashMap<String, Priority>>;

/// Builds a configuration key. `item` is ignored without a `group`.
pub fn priority_key(source: EventSource, group: Option<&str>, item: Option<&str>) -> String {
    let mut key = String::from(source.as_str());
    if let Some(group) = group {
        key.push('.');
        key.push_str(group);
        if let Some(item) = item {
            key.push('.');
            key.push_str(item);
        }
    }
    key
}

/// Log and screenshot thresholds for every `(source, group, item)`.
#[derive(Debug, Default)]
pub struct PriorityConfiguration {
    log: PriorityMap,
    screenshot: PriorityMap,
}

impl PriorityConfiguration {
    /// Creates an empty configuration. Every source must be seeded (see
    /// [`set_default_priority`](Self::set_default_priority)) before loggers
    /// for it can be resolved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration seeded with `priority` for every source.
    pub fn with_default(priority: Priority) -> Self {
        let config = Self::new();
        config.set_default_priority(priority);
        config
    }

    /// Seeds the log threshold of every source. Screenshot thresholds are
    /// seeded with the same value only while the screenshot map is empty.
    pub fn set_default_priority(&self, priority: Priority) {
        let mut log = write(&self.log);
        for source in EventSource::ALL {
            log.insert(source.as_str().to_string(), priority);
        }
        let mut screenshot = write(&self.screenshot);
        if screenshot.is_empty() {
            for source in EventSource::ALL {
                screenshot.insert(source.as_str().to_string(), priority);
            }
        }
    }

    /// Installs a log threshold for one key. The screenshot threshold of the
    /// same key is set too unless it already has one.
    pub fn set_priority(
        &self,
        priority: Priority,
        source: EventSource,
        group: Option<&str>,
        item: Option<&str>,
    ) {
        let key = priority_key(source, group, item);
        write(&self.log).insert(key.clone(), priority);
        write(&self.screenshot).entry(key).or_insert(priority);
    }

    /// Seeds the screenshot threshold of every source.
    pub fn set_default_screenshot_priority(&self, priority: Priority) {
        let mut screenshot = write(&self.screenshot);
        for source in EventSource::ALL {
            screenshot.insert(source.as_str().to_string(), priority);
        }
    }

    /// Installs a screenshot threshold for one key.
    pub fn set_screenshot_priority(
        &self,
        priority: Priority,
        source: EventSource,
        group: Option<&str>,
        item: Option<&str>,
    ) {
        write(&self.screenshot).insert(priority_key(source, group, item), priority);
    }

    /// Resolves the minimum priority at which events are logged.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::MissingDefault`] if the source was never seeded.
    pub fn log_threshold(
        &self,
        source: EventSource,
        group: Option<&str>,
        item: Option<&str>,
    ) -> Result<Priority, LoggerError> {
        resolve(&self.log, source, group, item)
    }

    /// Resolves the minimum priority at which screenshots are captured.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::MissingDefault`] if the source was never seeded.
    pub fn screenshot_threshold(
        &self,
        source: EventSource,
        group: Option<&str>,
        item: Option<&str>,
    ) -> Result<Priority, LoggerError> {
        resolve(&self.screenshot, source, group, item)
    }
}

fn resolve(
    map: &PriorityMap,
    source: EventSource,
    group: Option<&str>,
    item: Option<&str>,
) -> Result<Priority, LoggerError> {
    let full_key = priority_key(source, group, item);
    let cached = read(map).get(&full_key).copied();
    if let Some(priority) = cached {
        return Ok(priority);
    }

    let mut map = write(map);
    let group_key = priority_key(source, group, None);
    let resolved = match map.get(&group_key) {
        Some(priority) => *priority,
        None => {
            let default = *map
                .get(source.as_str())
                .ok_or(LoggerError::MissingDefault(source))?;
            map.insert(group_key, default);
            default
        }
    };
    map.insert(full_key, resolved);
    Ok(resolved)
}

// The maps hold plain values, so a writer that panicked cannot leave them
// half-updated.
fn read(map: &PriorityMap) -> RwLockReadGuard<'_, HashMap<String, Priority>> {
    map.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(map: &PriorityMap) -> RwLockWriteGuard<'_, HashMap<String, Priority>> {
    map.write().unwrap_or_else(PoisonError::into_inner)
}
