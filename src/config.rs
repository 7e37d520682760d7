// Location: src/config.rs

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{BridgeError, Result};

/// Entry type naming the model that answers user prompts.
pub const MAIN_MODEL_TYPE: &str = "main";

/// A loaded guardrails configuration bundle.
///
/// Bundles carry more than model entries (flows, instructions, prompts); the
/// guardrails engine owns those sections. This layer deserializes only what
/// it reads: the declarative model list.
#[derive(Debug, Clone, Deserialize)]
pub struct RailsConfig {
    /// Declarative model entries, keyed by their `type` tag.
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

/// One named model entry inside a guardrails bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    /// Role of this model inside the bundle (e.g. `main`, `embeddings`).
    #[serde(rename = "type")]
    pub model_type: String,

    /// Provider name the guardrails engine resolves for this entry.
    #[serde(default)]
    pub engine: String,

    /// Open option mapping: `path`, `device`, `num_gpus`, and whatever else
    /// the engine understands.
    #[serde(default)]
    pub parameters: Mapping,
}

impl RailsConfig {
    /// Load a bundle from `path`.
    ///
    /// Accepts a bundle directory containing `config.yml` (or `config.yaml`)
    /// as the guardrails convention has it, or a direct path to the file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = if path.is_dir() {
            let yml = path.join("config.yml");
            if yml.is_file() {
                yml
            } else {
                path.join("config.yaml")
            }
        } else {
            path.to_path_buf()
        };

        let raw = fs::read_to_string(&file).map_err(|e| {
            BridgeError::configuration("config", format!("cannot read {}: {}", file.display(), e))
        })?;
        serde_yaml::from_str(&raw).map_err(|e| {
            BridgeError::configuration("config", format!("malformed bundle {}: {}", file.display(), e))
        })
    }

    /// First entry whose `type` tag matches `kind`, if any.
    ///
    /// Bundles are expected to carry at most one entry per type; duplicates
    /// are not rejected, the first match wins.
    pub fn model_config(&self, kind: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|entry| entry.model_type == kind)
    }

    /// The `main` model entry.
    pub fn main_model(&self) -> Result<&ModelEntry> {
        self.model_config(MAIN_MODEL_TYPE).ok_or_else(|| {
            BridgeError::configuration("models", "no model entry with type \"main\"")
        })
    }
}

impl ModelEntry {
    /// Raw parameter value for `key`.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    /// String parameter value for `key`.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }
}
