//! Resolves the fixed special-token vocabulary every task handler needs,
//! by name, from a configured tokenizer. Ported from
//! `kl3m_data/api/loader/task/base.py::BaseTask.__init__`.

use kl3m_core::{KlError, KlResult, Tokenizer};

#[derive(Debug, Clone, Copy)]
pub struct SpecialTokens {
    pub start: u32,
    pub end: u32,
    pub mask: u32,
    pub unk: u32,
    pub cls: u32,
    pub sep: u32,
    pub pad: u32,
}

const SPECIAL_TOKEN_NAMES: [(&str, &str); 7] = [
    ("start", "<|start|>"),
    ("end", "<|end|>"),
    ("mask", "<|mask|>"),
    ("unk", "<|unk|>"),
    ("cls", "<|cls|>"),
    ("sep", "<|sep|>"),
    ("pad", "<|pad|>"),
];

impl SpecialTokens {
    pub fn resolve(tokenizer: &dyn Tokenizer) -> KlResult<Self> {
        let mut ids = [0u32; 7];
        for (i, (_, token)) in SPECIAL_TOKEN_NAMES.iter().enumerate() {
            ids[i] = tokenizer
                .id_of_token(token)
                .ok_or_else(|| KlError::Other(anyhow::anyhow!("tokenizer is missing special token {token}")))?;
        }
        Ok(Self {
            start: ids[0],
            end: ids[1],
            mask: ids[2],
            unk: ids[3],
            cls: ids[4],
            sep: ids[5],
            pad: ids[6],
        })
    }
}
