//! Model placement, loading, and provider construction.

mod loader;
mod pipeline;
mod placement;
mod tokenizer;

pub use loader::{FetchOptions, LoadRequest, ModelLoader};
pub use pipeline::{GenerationSettings, TextGenerationPipeline};
pub use placement::{DeviceKind, DeviceMap, GpuCount, PlacementPlan, PER_DEVICE_MEMORY_BUDGET};
pub use tokenizer::PipelineTokenizer;

use std::env;
use std::sync::Arc;

use tracing::info;

use crate::config::RailsConfig;
use crate::error::{BridgeError, Result};
use crate::provider::{ProviderRegistry, TextGenerator};

/// Provider name the main model registers under. Guardrails bundles bind to
/// it through their `engine` field.
pub const MAIN_MODEL_PROVIDER: &str = "hf_pipeline_llama3_8b";

/// Environment variable carrying an optional auth token for gated checkpoints.
pub const HF_TOKEN_VAR: &str = "HF_TOKEN";

/// Loading collaborator seam.
///
/// Production uses [`ModelLoader`]; tests substitute recorders. Failures
/// inside implementations reach the initializer untranslated.
pub trait ProviderLoader: Send + Sync {
    /// Turn a load request into a ready text-generation provider.
    fn load(&self, request: &LoadRequest) -> Result<Arc<dyn TextGenerator>>;
}

/// Initialize the main model named by `config` and register it in `registry`.
///
/// Resolves the `main` entry, derives its placement plan fresh, loads through
/// `loader`, and registers the resulting provider under
/// [`MAIN_MODEL_PROVIDER`]. Re-initialization overwrites the prior
/// registration under that name.
pub fn init_main_model(
    config: &RailsConfig,
    registry: &ProviderRegistry,
    loader: &dyn ProviderLoader,
) -> Result<()> {
    let entry = config.main_model()?;
    let path = entry.param_str("path").ok_or_else(|| {
        BridgeError::configuration("path", "main model entry has no checkpoint path")
    })?;
    let plan = PlacementPlan::from_entry(entry)?;
    let request = LoadRequest {
        checkpoint: path.to_string(),
        plan,
        auth_token: env::var(HF_TOKEN_VAR).ok(),
    };

    info!(
        checkpoint = %request.checkpoint,
        device = request.plan.device.as_str(),
        "initializing main model"
    );
    let provider = loader.load(&request)?;
    registry.register(MAIN_MODEL_PROVIDER, provider);
    Ok(())
}
