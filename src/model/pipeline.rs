// Location: src/model/pipeline.rs

use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaEosToks};
use tracing::debug;

use super::tokenizer::PipelineTokenizer;
use crate::error::{BridgeError, Result};
use crate::provider::TextGenerator;

/// Sampling seed for the wrapped pipeline.
const SAMPLING_SEED: u64 = 299792458;

/// Fixed generation parameters for the wrapped pipeline.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Hard ceiling on newly generated tokens per call
    pub max_new_tokens: usize,
    /// Sampling temperature
    pub temperature: f64,
    /// Sample from the distribution rather than decoding greedily
    pub do_sample: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            temperature: 0.1,
            do_sample: true,
        }
    }
}

impl GenerationSettings {
    fn sampling_temperature(&self) -> Option<f64> {
        self.do_sample.then_some(self.temperature)
    }
}

/// Text-generation callable built from a loaded (model, tokenizer) pair.
///
/// A fresh KV cache is built per call: conversational state belongs to the
/// guardrails session, not to this layer, so calls are independent.
pub struct TextGenerationPipeline {
    model: Llama,
    config: Config,
    tokenizer: PipelineTokenizer,
    device: Device,
    dtype: DType,
    settings: GenerationSettings,
}

impl TextGenerationPipeline {
    pub(crate) fn new(
        model: Llama,
        config: Config,
        tokenizer: PipelineTokenizer,
        device: Device,
        dtype: DType,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            model,
            config,
            tokenizer,
            device,
            dtype,
            settings,
        }
    }

    fn run(&self, prompt: &str) -> Result<String> {
        let mut tokens = self.tokenizer.encode(prompt)?;
        if tokens.is_empty() {
            return Ok(String::new());
        }

        let mut cache = Cache::new(true, self.dtype, &self.config, &self.device)
            .map_err(|e| BridgeError::upstream("kv cache", e))?;
        let mut sampler = LogitsProcessor::new(
            SAMPLING_SEED,
            self.settings.sampling_temperature(),
            None,
        );
        let mut generated: Vec<u32> = Vec::new();
        let mut index_pos = 0;

        for step in 0..self.settings.max_new_tokens {
            let context_size = if step > 0 { 1 } else { tokens.len() };
            let context = &tokens[tokens.len() - context_size..];
            let input = Tensor::new(context, &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(|e| BridgeError::upstream("generation", e))?;
            let logits = self
                .model
                .forward(&input, index_pos, &mut cache)
                .and_then(|l| l.squeeze(0))
                .and_then(|l| l.to_dtype(DType::F32))
                .map_err(|e| BridgeError::upstream("generation", e))?;
            let next = sampler
                .sample(&logits)
                .map_err(|e| BridgeError::upstream("sampling", e))?;

            index_pos += context_size;
            tokens.push(next);
            if matches_eos(self.config.eos_token_id.as_ref(), self.tokenizer.eos_token_id(), next) {
                break;
            }
            generated.push(next);
        }

        debug!(tokens = generated.len(), "generation finished");
        self.tokenizer.decode(&generated)
    }
}

impl TextGenerator for TextGenerationPipeline {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.run(prompt)
    }
}

fn matches_eos(eos: Option<&LlamaEosToks>, fallback: Option<u32>, token: u32) -> bool {
    match eos {
        Some(LlamaEosToks::Single(id)) => *id == token,
        Some(LlamaEosToks::Multiple(ids)) => ids.contains(&token),
        None => fallback == Some(token),
    }
}
