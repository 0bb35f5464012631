//! Command handlers.

pub mod config;
pub mod ingest;
pub mod serve;

use std::path::Path;

use picstash_core::Config;

/// Load the configuration for this run.
///
/// An explicit `--config` path must load. A broken file at the default
/// location only warns and falls back to defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return Config::load_from(path).map_err(|e| {
            anyhow::anyhow!("Failed to load config from {}: {}", path.display(), e)
        });
    }

    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `picstash config path`."
            );
            Ok(Config::default())
        }
    }
}
