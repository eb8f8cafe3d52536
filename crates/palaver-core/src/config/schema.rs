//! Typed configuration schema with serde defaults for every field, so a
//! partial config file always deserializes.

use serde::{Deserialize, Serialize};

use crate::types::{Effort, Verbosity};

/// Top-level configuration (`~/.palaver/config.json`).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub defaults: DefaultsConfig,
    /// Workspace root all tool paths are sandboxed to. `~` is expanded.
    pub workspace: String,
}

/// Remote reasoning service connection settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub key: String,
    pub base: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            base: "https://api.openai.com/v1".into(),
        }
    }
}

/// Per-request defaults, overridable by CLI flags.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DefaultsConfig {
    pub model: String,
    pub effort: Effort,
    pub verbosity: Verbosity,
    /// Maximum model ↔ tool round trips per request.
    pub max_iterations: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: "gpt-5".into(),
            effort: Effort::Medium,
            verbosity: Verbosity::Medium,
            max_iterations: 10,
        }
    }
}
