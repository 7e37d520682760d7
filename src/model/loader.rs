// Location: src/model/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::Device;
use candle_nn::VarBuilder;
use candle_transformers::models::llama::{Config, Llama, LlamaConfig};
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use tracing::{debug, info};

use super::pipeline::{GenerationSettings, TextGenerationPipeline};
use super::placement::{DeviceKind, PlacementPlan};
use super::tokenizer::PipelineTokenizer;
use super::ProviderLoader;
use crate::error::{BridgeError, Result};
use crate::provider::TextGenerator;

/// Parameters for a single checkpoint load.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Local checkpoint directory or hub repo id
    pub checkpoint: String,
    /// Placement directives derived from the model entry
    pub plan: PlacementPlan,
    /// Auth token for gated checkpoints, when the environment provides one
    pub auth_token: Option<String>,
}

/// Options for one collaborator fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Checkpoint location the fetch resolves against
    pub checkpoint: String,
    /// Auth token forwarded to the hub, when present
    pub auth_token: Option<String>,
}

impl LoadRequest {
    /// Fetch options for the tokenizer. Carries the auth token when set.
    pub fn tokenizer_fetch(&self) -> FetchOptions {
        FetchOptions {
            checkpoint: self.checkpoint.clone(),
            auth_token: self.auth_token.clone(),
        }
    }

    /// Fetch options for the model config and weights. Carries the auth
    /// token when set.
    pub fn weights_fetch(&self) -> FetchOptions {
        FetchOptions {
            checkpoint: self.checkpoint.clone(),
            auth_token: self.auth_token.clone(),
        }
    }
}

/// On-disk artifacts backing one model load.
#[derive(Debug, Clone)]
struct CheckpointArtifacts {
    config: PathBuf,
    weights: Vec<PathBuf>,
}

/// Loads checkpoints through the model hub and builds generation providers.
///
/// Local directories short-circuit the hub entirely; anything else is treated
/// as a repo id. All failures propagate untranslated as upstream errors.
pub struct ModelLoader {
    show_progress: bool,
}

impl ModelLoader {
    /// Create a loader. Progress reporting is routed away when
    /// `show_progress` is false.
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }

    fn repo(&self, options: &FetchOptions) -> Result<ApiRepo> {
        let api = ApiBuilder::new()
            .with_token(options.auth_token.clone())
            .with_progress(self.show_progress)
            .build()
            .map_err(|e| BridgeError::upstream("hub client", e))?;
        Ok(api.model(options.checkpoint.clone()))
    }

    fn fetch_tokenizer(&self, options: &FetchOptions) -> Result<PipelineTokenizer> {
        let root = Path::new(&options.checkpoint);
        let path = if root.is_dir() {
            root.join("tokenizer.json")
        } else {
            self.repo(options)?
                .get("tokenizer.json")
                .map_err(|e| BridgeError::upstream("tokenizer fetch", e))?
        };
        PipelineTokenizer::from_file(path)
    }

    fn fetch_model(
        &self,
        options: &FetchOptions,
        plan: &PlacementPlan,
    ) -> Result<(Llama, Config, Device)> {
        let artifacts = self.resolve_weights(options)?;
        let device = target_device(plan)?;
        if let Some(map) = plan.device_map {
            // Shard distribution is the backend's concern; this layer records
            // the request and hosts the graph on the primary accelerator.
            info!(?map, max_memory = ?plan.max_memory, "device map requested");
        }

        let raw = fs::read_to_string(&artifacts.config)
            .map_err(|e| BridgeError::upstream("model config read", e))?;
        let llama_config: LlamaConfig =
            serde_json::from_str(&raw).map_err(|e| BridgeError::upstream("model config parse", e))?;
        let config = llama_config.into_config(false);

        // Mmap keeps host memory flat while weights stream to the device.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&artifacts.weights, plan.dtype, &device)
        }
        .map_err(|e| BridgeError::upstream("weight mmap", e))?;
        let model =
            Llama::load(vb, &config).map_err(|e| BridgeError::upstream("model load", e))?;
        if plan.post_load_move {
            debug!(device = plan.device.as_str(), "model hosted on its single accelerator");
        }
        Ok((model, config, device))
    }

    fn resolve_weights(&self, options: &FetchOptions) -> Result<CheckpointArtifacts> {
        let root = Path::new(&options.checkpoint);
        if root.is_dir() {
            return local_artifacts(root);
        }
        self.hub_artifacts(options)
    }

    fn hub_artifacts(&self, options: &FetchOptions) -> Result<CheckpointArtifacts> {
        let repo = self.repo(options)?;
        let config = repo
            .get("config.json")
            .map_err(|e| BridgeError::upstream("model config fetch", e))?;
        let weights = match repo.get("model.safetensors.index.json") {
            Ok(index) => sharded_weights(&repo, &index)?,
            Err(_) => vec![repo
                .get("model.safetensors")
                .map_err(|e| BridgeError::upstream("weights fetch", e))?],
        };
        Ok(CheckpointArtifacts { config, weights })
    }
}

impl ProviderLoader for ModelLoader {
    fn load(&self, request: &LoadRequest) -> Result<Arc<dyn TextGenerator>> {
        let tokenizer = self.fetch_tokenizer(&request.tokenizer_fetch())?;
        let (model, config, device) = self.fetch_model(&request.weights_fetch(), &request.plan)?;
        let pipeline = TextGenerationPipeline::new(
            model,
            config,
            tokenizer,
            device,
            request.plan.dtype,
            GenerationSettings::default(),
        );
        Ok(Arc::new(pipeline))
    }
}

/// Artifacts from a locally saved checkpoint directory.
fn local_artifacts(root: &Path) -> Result<CheckpointArtifacts> {
    let mut weights: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|e| BridgeError::upstream("checkpoint listing", e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "safetensors"))
        .collect();
    weights.sort();
    if weights.is_empty() {
        return Err(BridgeError::configuration(
            "path",
            format!("no safetensors weights under {}", root.display()),
        ));
    }
    Ok(CheckpointArtifacts {
        config: root.join("config.json"),
        weights,
    })
}

/// Distinct shard files named by a sharded-checkpoint index.
fn sharded_weights(repo: &ApiRepo, index: &Path) -> Result<Vec<PathBuf>> {
    let raw =
        fs::read_to_string(index).map_err(|e| BridgeError::upstream("weight index read", e))?;
    let json: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| BridgeError::upstream("weight index parse", e))?;
    let map = json
        .get("weight_map")
        .and_then(|value| value.as_object())
        .ok_or_else(|| {
            BridgeError::configuration("weight_map", "weight index has no weight_map object")
        })?;

    let mut names: Vec<&str> = map.values().filter_map(|value| value.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    names
        .into_iter()
        .map(|name| {
            repo.get(name)
                .map_err(|e| BridgeError::upstream("weights fetch", e))
        })
        .collect()
}

/// Candle device realizing the plan's target.
fn target_device(plan: &PlacementPlan) -> Result<Device> {
    match plan.device {
        DeviceKind::Cpu => Ok(Device::Cpu),
        DeviceKind::Cuda => {
            Device::new_cuda(0).map_err(|e| BridgeError::upstream("cuda device", e))
        }
        DeviceKind::Mps => {
            Device::new_metal(0).map_err(|e| BridgeError::upstream("metal device", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GpuCount;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn cpu_request(token: Option<&str>) -> LoadRequest {
        LoadRequest {
            checkpoint: "/m".to_string(),
            plan: PlacementPlan::build(DeviceKind::Cpu, GpuCount::default()),
            auth_token: token.map(str::to_string),
        }
    }

    #[test]
    fn test_both_fetches_carry_auth_token() {
        let request = cpu_request(Some("hf_abc"));
        assert_eq!(request.tokenizer_fetch().auth_token.as_deref(), Some("hf_abc"));
        assert_eq!(request.weights_fetch().auth_token.as_deref(), Some("hf_abc"));
    }

    #[test]
    fn test_neither_fetch_invents_auth_token() {
        let request = cpu_request(None);
        assert_eq!(request.tokenizer_fetch().auth_token, None);
        assert_eq!(request.weights_fetch().auth_token, None);
    }

    #[test]
    fn test_local_artifacts_discovers_sorted_weights() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("model-00002-of-00002.safetensors"), b"")?;
        std::fs::write(dir.path().join("model-00001-of-00002.safetensors"), b"")?;
        std::fs::write(dir.path().join("config.json"), b"{}")?;

        let artifacts = local_artifacts(dir.path())?;
        assert_eq!(artifacts.config, dir.path().join("config.json"));
        assert_eq!(artifacts.weights.len(), 2);
        assert!(artifacts.weights[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("model-00001"));
        Ok(())
    }

    #[test]
    fn test_local_artifacts_requires_weights() {
        let dir = tempdir().unwrap();
        let result = local_artifacts(dir.path());
        assert!(matches!(result, Err(BridgeError::Configuration { .. })));
    }

    #[test]
    fn test_cpu_plan_targets_cpu_device() {
        let plan = PlacementPlan::build(DeviceKind::Cpu, GpuCount::default());
        let device = target_device(&plan).unwrap();
        assert!(matches!(device, Device::Cpu));
    }
}
