// Location: src/model/tokenizer.rs

use std::path::Path;

use tokenizers::Tokenizer as HfTokenizer;

use crate::error::{BridgeError, Result};

/// Tokenizer for the wrapped pipeline, with the checkpoint's end-of-sequence
/// token resolved up front.
pub struct PipelineTokenizer {
    inner: HfTokenizer,
    eos_token_id: Option<u32>,
}

impl PipelineTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let inner = HfTokenizer::from_file(path)
            .map_err(|e| BridgeError::upstream("tokenizer load", e))?;
        // Llama 3 spells end-of-turn differently from the classic </s>.
        let eos_token_id = ["<|eot_id|>", "<|end_of_text|>", "</s>"]
            .iter()
            .find_map(|token| inner.token_to_id(token));
        Ok(Self {
            inner,
            eos_token_id,
        })
    }

    /// Encode `text` into token ids, special tokens included.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| BridgeError::upstream("tokenization", e))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decode token ids back to text, skipping special tokens.
    pub fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.inner
            .decode(tokens, true)
            .map_err(|e| BridgeError::upstream("decoding", e))
    }

    /// End-of-sequence token id, when the vocabulary declares one.
    pub fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }
}
