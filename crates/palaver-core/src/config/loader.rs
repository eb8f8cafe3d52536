//! Config loader — reads `~/.palaver/config.json`, merges env vars, and
//! applies legacy migrations.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.palaver/config.json`
//! 3. Environment variables `PALAVER_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be
/// parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("no config file at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    // Parse JSON → Value first for migration
    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    migrate_config(&mut raw);

    let config: Config = match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!("failed to deserialize config: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("config saved to {}", config_path.display());
    Ok(())
}

/// Apply legacy config migrations.
///
/// Moves a top-level `model` (pre-sections layout) into `defaults.model`.
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(obj) = raw.as_object_mut() else {
        return;
    };
    if let Some(model) = obj.remove("model") {
        let defaults = obj
            .entry("defaults")
            .or_insert_with(|| serde_json::json!({}));
        if defaults.get("model").is_none() {
            defaults["model"] = model;
            debug!("migrated top-level model → defaults.model");
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `PALAVER_<SECTION>__<FIELD>` (double underscore as
/// delimiter).
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(key) = std::env::var("PALAVER_API__KEY") {
        config.api.key = key;
    }
    if let Ok(base) = std::env::var("PALAVER_API__BASE") {
        config.api.base = base;
    }
    if let Ok(model) = std::env::var("PALAVER_DEFAULTS__MODEL") {
        config.defaults.model = model;
    }
    if let Ok(effort) = std::env::var("PALAVER_DEFAULTS__EFFORT") {
        match effort.parse() {
            Ok(e) => config.defaults.effort = e,
            Err(e) => warn!("ignoring PALAVER_DEFAULTS__EFFORT: {e}"),
        }
    }
    if let Ok(verbosity) = std::env::var("PALAVER_DEFAULTS__VERBOSITY") {
        match verbosity.parse() {
            Ok(v) => config.defaults.verbosity = v,
            Err(e) => warn!("ignoring PALAVER_DEFAULTS__VERBOSITY: {e}"),
        }
    }
    if let Ok(max) = std::env::var("PALAVER_DEFAULTS__MAX_ITERATIONS") {
        match max.parse() {
            Ok(n) => config.defaults.max_iterations = n,
            Err(e) => warn!("ignoring PALAVER_DEFAULTS__MAX_ITERATIONS: {e}"),
        }
    }
    if let Ok(workspace) = std::env::var("PALAVER_WORKSPACE") {
        config.workspace = workspace;
    }
    config
}
