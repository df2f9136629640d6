//! Concrete [`Tokenizer`] backed by the `tokenizers` crate, loading a
//! HuggingFace tokenizer JSON file or hub identifier. Every other module
//! in this workspace consumes tokenization through the trait alone; this
//! is the one place that binds it to a real vocabulary.

use kl3m_core::{KlError, KlResult, Tokenizer};

pub struct HfTokenizer {
    name: String,
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Loads a tokenizer from a local `tokenizer.json` file.
    pub fn from_file(name: impl Into<String>, path: &str) -> KlResult<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| KlError::Other(anyhow::anyhow!("failed to load tokenizer {path}: {e}")))?;
        Ok(Self { name: name.into(), inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, text: &str, add_special_tokens: bool) -> KlResult<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, add_special_tokens)
            .map_err(|e| KlError::Other(anyhow::anyhow!("tokenizer {} failed to encode: {e}", self.name)))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> KlResult<String> {
        self.inner
            .decode(ids, skip_special_tokens)
            .map_err(|e| KlError::Other(anyhow::anyhow!("tokenizer {} failed to decode: {e}", self.name)))
    }

    fn id_of_token(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_surfaces_as_kl_error_not_a_panic() {
        let result = HfTokenizer::from_file("missing", "/nonexistent/tokenizer.json");
        assert!(result.is_err());
    }
}
