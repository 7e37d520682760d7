//! rails-bridge - Guardrailed language model integration layer
//!
//! This crate connects a locally checkpointed causal language model to a
//! guardrails configuration bundle and exposes the result to prompt-testing
//! harnesses. Two thin pieces: a model initializer that derives hardware
//! placement from the bundle's `main` entry, loads through the model hub,
//! and registers a named text-generation provider; and an adapter that binds
//! the loaded bundle into a session and answers one prompt per call.
//!
//! Generation, tokenization, and guardrail policy evaluation are delegated
//! to external collaborators (`candle`, `tokenizers`, `hf-hub`, the
//! guardrails engine); nothing here reimplements them.

#![warn(missing_docs)]

use std::fmt;

// Public modules
pub mod adapter;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod provider;
pub mod rails;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-exports for public API
pub use adapter::{GuardrailsAdapter, HarnessConfig};
pub use config::{ModelEntry, RailsConfig};
pub use error::{BridgeError, Result};
pub use model::{
    init_main_model, DeviceKind, GpuCount, LoadRequest, ModelLoader, PlacementPlan,
    ProviderLoader, MAIN_MODEL_PROVIDER,
};
pub use provider::{ProviderRegistry, TextGenerator};
pub use rails::LLMRails;

/// Capability detection for the dependencies this layer builds on
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Whether the guardrails session layer is compiled in
    pub rails: bool,
    /// Whether CUDA support is enabled
    pub cuda: bool,
    /// Number of detected CUDA devices
    pub cuda_devices: usize,
    /// Whether the Metal backend is enabled
    pub metal: bool,
}

impl Capabilities {
    /// Detect available capabilities at runtime.
    ///
    /// Performed once at startup by adapter construction; the result is data,
    /// not an exception — callers decide how to surface an absence.
    pub fn detect() -> Self {
        #[cfg(feature = "cuda")]
        let (cuda, cuda_devices) = {
            let count = (0..8)
                .filter(|&i| candle_core::Device::new_cuda(i).is_ok())
                .count();
            (count > 0, count)
        };

        #[cfg(not(feature = "cuda"))]
        let (cuda, cuda_devices) = (false, 0);

        Self {
            rails: cfg!(feature = "rails"),
            cuda,
            cuda_devices,
            metal: cfg!(feature = "metal"),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rails support: {}", if self.rails { "yes" } else { "no" })?;
        writeln!(f, "CUDA support: {}", if self.cuda { "yes" } else { "no" })?;
        if self.cuda {
            writeln!(f, "CUDA devices: {}", self.cuda_devices)?;
        }
        writeln!(f, "Metal support: {}", if self.metal { "yes" } else { "no" })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_detection() {
        let capabilities = Capabilities::detect();
        println!("Detected capabilities:\n{}", capabilities);
        assert!(capabilities.rails);
    }

    #[test]
    fn test_version_number() {
        assert!(!VERSION.is_empty());
    }
}
