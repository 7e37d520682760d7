//! Harness-facing adapter around a guardrails session.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::RailsConfig;
use crate::error::{BridgeError, Result};
use crate::logging::{self, LogConfig};
use crate::model::{self, ModelLoader, ProviderLoader};
use crate::provider::ProviderRegistry;
use crate::rails::LLMRails;
use crate::Capabilities;

/// Harness-level configuration root shared across adapters.
pub struct HarnessConfig {
    /// Provider registrations visible to sessions built under this root.
    /// Owned here rather than held process-wide, so adapters with different
    /// checkpoints can coexist without overwriting each other.
    pub registry: Arc<ProviderRegistry>,
    /// Route collaborator progress output to a discarded sink.
    pub quiet_collaborators: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            registry: Arc::new(ProviderRegistry::new()),
            quiet_collaborators: true,
        }
    }
}

/// Adapts the configure-then-generate guardrails session to the single-prompt
/// request/response shape a prompt-testing harness drives.
pub struct GuardrailsAdapter {
    name: String,
    fullname: String,
    rails: LLMRails,
}

impl GuardrailsAdapter {
    /// Build a ready adapter from the configuration bundle at `name`.
    ///
    /// Sequencing: capability check, bundle load, main model initialization
    /// (which registers the provider in the root's registry), session
    /// binding. Any failure aborts construction — a partially-ready adapter
    /// is never returned.
    pub fn new(name: impl Into<String>, config_root: &HarnessConfig) -> Result<Self> {
        let loader = ModelLoader::new(!config_root.quiet_collaborators);
        Self::with_parts(name, config_root, Capabilities::detect(), &loader)
    }

    fn with_parts(
        name: impl Into<String>,
        config_root: &HarnessConfig,
        capabilities: Capabilities,
        loader: &dyn ProviderLoader,
    ) -> Result<Self> {
        // Collaborator chatter is discarded at the subscriber; a subscriber
        // the harness already installed stays in place.
        if let Err(reason) = logging::setup_logging(LogConfig {
            quiet_collaborators: config_root.quiet_collaborators,
            ..LogConfig::default()
        }) {
            debug!(reason = %reason, "keeping the previously installed log subscriber");
        }

        if !capabilities.rails {
            return Err(BridgeError::DependencyMissing {
                dependency: "rails",
                hint: "rebuild with the `rails` feature enabled (`cargo build --features rails`)",
            });
        }

        let name = name.into();
        info!(bundle = %name, "loading guardrails configuration");
        let config = RailsConfig::from_path(&name)?;
        model::init_main_model(&config, &config_root.registry, loader)?;
        let rails = LLMRails::new(config, &config_root.registry)?;

        let fullname = format!("Guardrails {name}");
        Ok(Self {
            name,
            fullname,
            rails,
        })
    }

    /// One guardrailed response for `prompt`.
    ///
    /// The multiplicity hint exists for harness-interface parity only: the
    /// wrapped session produces a single response per call, so the returned
    /// vector always holds exactly one element — the text, or `None` when
    /// the session yielded nothing usable. Session failures abort this call
    /// and nothing else.
    pub fn generate(
        &self,
        prompt: &str,
        generations_this_call: usize,
    ) -> Result<Vec<Option<String>>> {
        if generations_this_call > 1 {
            debug!(
                requested = generations_this_call,
                "guardrails sessions produce one response per call"
            );
        }
        let result = self.rails.generate(prompt)?;
        Ok(vec![result])
    }

    /// Bundle path this adapter was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name for harness reports.
    pub fn fullname(&self) -> &str {
        &self.fullname
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoadRequest, MAIN_MODEL_PROVIDER};
    use crate::provider::TextGenerator;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    struct Echo;

    impl TextGenerator for Echo {
        fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("echo: {prompt}"))
        }
    }

    struct StubLoader;

    impl ProviderLoader for StubLoader {
        fn load(&self, _request: &LoadRequest) -> Result<Arc<dyn TextGenerator>> {
            Ok(Arc::new(Echo))
        }
    }

    fn caps(rails: bool) -> Capabilities {
        Capabilities {
            rails,
            cuda: false,
            cuda_devices: 0,
            metal: false,
        }
    }

    fn write_bundle(dir: &std::path::Path) {
        std::fs::write(
            dir.join("config.yml"),
            "models:\n  - type: main\n    engine: hf_pipeline_llama3_8b\n    parameters:\n      path: /m\n      device: cpu\n",
        )
        .unwrap();
    }

    #[test]
    fn test_missing_rails_capability_fails_before_any_loading() {
        let root = HarnessConfig::default();
        let result = GuardrailsAdapter::with_parts(
            "/definitely/not/a/bundle",
            &root,
            caps(false),
            &StubLoader,
        );
        assert!(matches!(
            result,
            Err(BridgeError::DependencyMissing { dependency: "rails", .. })
        ));
        // Nothing was registered: the capability check ran first.
        assert!(root.registry.is_empty());
    }

    #[test]
    fn test_construction_registers_provider_and_binds_session() {
        let dir = tempdir().unwrap();
        write_bundle(dir.path());
        let root = HarnessConfig::default();

        let adapter = GuardrailsAdapter::with_parts(
            dir.path().to_string_lossy().into_owned(),
            &root,
            caps(true),
            &StubLoader,
        )
        .unwrap();

        assert!(root.registry.resolve(MAIN_MODEL_PROVIDER).is_some());
        assert!(adapter.fullname().starts_with("Guardrails "));
    }

    #[test]
    fn test_generate_returns_exactly_one_element() {
        let dir = tempdir().unwrap();
        write_bundle(dir.path());
        let root = HarnessConfig::default();
        let adapter = GuardrailsAdapter::with_parts(
            dir.path().to_string_lossy().into_owned(),
            &root,
            caps(true),
            &StubLoader,
        )
        .unwrap();

        for hint in [0, 1, 5] {
            let results = adapter.generate("hello", hint).unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].as_deref(), Some("echo: hello"));
        }
    }

    #[test]
    fn test_missing_bundle_aborts_construction() {
        let root = HarnessConfig::default();
        let result = GuardrailsAdapter::with_parts(
            "/definitely/not/a/bundle",
            &root,
            caps(true),
            &StubLoader,
        );
        assert!(matches!(result, Err(BridgeError::Configuration { .. })));
    }
}
