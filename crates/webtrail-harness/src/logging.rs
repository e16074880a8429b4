//! Diagnostic logging setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs the global `tracing` subscriber described by `config`.
///
/// Returns `false` if a subscriber was already installed, which is the
/// normal case when several test binaries share one process.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    match installed {
        Ok(()) => {
            tracing::debug!(level = %config.level, json = config.json, "tracing initialised");
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialisation_is_harmless() {
        let config = LoggingConfig {
            level: "not a [valid filter".to_string(),
            json: false,
        };
        init_tracing(&config);
        assert!(!init_tracing(&config), "a subscriber is installed by now");
    }
}
