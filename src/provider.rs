use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::Result;

/// Uniform text-generation capability the guardrails engine resolves by name.
pub trait TextGenerator: Send + Sync {
    /// Produce one completion for `prompt`. Blocks for the full generation.
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Named provider registrations.
///
/// An explicit object rather than process-wide state: each harness
/// configuration owns one, so adapters with different checkpoints cannot
/// interfere with each other through a shared namespace. Rebind policy is
/// last-write-wins; overrides are logged, not rejected.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<dyn TextGenerator>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`, replacing any prior registration.
    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn TextGenerator>) {
        let name = name.into();
        if self.providers.insert(name.clone(), provider).is_some() {
            warn!(provider = %name, "replacing existing provider registration");
        } else {
            debug!(provider = %name, "registered provider");
        }
    }

    /// Look up the provider registered under `name`.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn TextGenerator>> {
        self.providers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .providers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    impl TextGenerator for Echo {
        fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("{}: {}", self.0, prompt))
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());

        registry.register("echo", Arc::new(Echo("a")));
        let provider = registry.resolve("echo").expect("registered");
        assert_eq!(provider.generate("hi").unwrap(), "a: hi");
        assert!(registry.resolve("other").is_none());
    }

    #[test]
    fn test_rebind_is_last_write_wins() {
        let registry = ProviderRegistry::new();
        registry.register("echo", Arc::new(Echo("first")));
        registry.register("echo", Arc::new(Echo("second")));

        assert_eq!(registry.len(), 1);
        let provider = registry.resolve("echo").unwrap();
        assert_eq!(provider.generate("x").unwrap(), "second: x");
    }
}
