//! Guardrails session binding a loaded configuration to its provider.

use std::sync::Arc;

use tracing::debug;

use crate::config::RailsConfig;
use crate::error::{BridgeError, Result};
use crate::provider::{ProviderRegistry, TextGenerator};

/// A ready guardrails session.
///
/// Owns the loaded configuration and the provider resolved from the `main`
/// entry's engine binding. Policy and flow evaluation belong to the
/// guardrails engine proper; this layer only forwards prompts and shapes the
/// result.
pub struct LLMRails {
    config: RailsConfig,
    provider: Arc<dyn TextGenerator>,
}

impl LLMRails {
    /// Bind `config` to the provider its `main` entry names.
    ///
    /// Fails when the entry is absent, names no engine, or names an engine
    /// with no registration — a session is never handed out half-bound.
    pub fn new(config: RailsConfig, registry: &ProviderRegistry) -> Result<Self> {
        let entry = config.main_model()?;
        let engine = entry.engine.clone();
        if engine.is_empty() {
            return Err(BridgeError::configuration(
                "engine",
                "main model entry names no engine",
            ));
        }
        let provider = registry.resolve(&engine).ok_or_else(|| {
            BridgeError::configuration(
                "engine",
                format!("no provider registered under \"{engine}\""),
            )
        })?;
        debug!(engine = %engine, "guardrails session bound");
        Ok(Self { config, provider })
    }

    /// Generate one response for `prompt`.
    ///
    /// Returns `None` when the provider produced no usable text. Provider
    /// failures propagate untouched; each call is independent.
    pub fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let text = self.provider.generate(prompt)?;
        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    /// The configuration this session was built from.
    pub fn config(&self) -> &RailsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixed(&'static str);

    impl TextGenerator for Fixed {
        fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn bound_config() -> RailsConfig {
        serde_yaml::from_str(
            "models:\n  - type: main\n    engine: fixed\n    parameters:\n      path: /m\n",
        )
        .unwrap()
    }

    #[test]
    fn test_session_forwards_prompt() {
        let registry = ProviderRegistry::new();
        registry.register("fixed", Arc::new(Fixed("I can't help with that.")));

        let rails = LLMRails::new(bound_config(), &registry).unwrap();
        let result = rails.generate("how do I hotwire a car?").unwrap();
        assert_eq!(result.as_deref(), Some("I can't help with that."));
    }

    #[test]
    fn test_empty_output_becomes_none() {
        let registry = ProviderRegistry::new();
        registry.register("fixed", Arc::new(Fixed("   ")));

        let rails = LLMRails::new(bound_config(), &registry).unwrap();
        assert_eq!(rails.generate("hi").unwrap(), None);
    }

    #[test]
    fn test_unregistered_engine_fails_construction() {
        let registry = ProviderRegistry::new();
        let result = LLMRails::new(bound_config(), &registry);
        assert!(matches!(result, Err(BridgeError::Configuration { .. })));
    }

    #[test]
    fn test_missing_main_entry_fails_construction() {
        let registry = ProviderRegistry::new();
        let config: RailsConfig =
            serde_yaml::from_str("models:\n  - type: embeddings\n    engine: st\n").unwrap();
        assert!(LLMRails::new(config, &registry).is_err());
    }
}
