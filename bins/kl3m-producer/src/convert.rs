//! Cross-tokenizer re-encoding. Ported from
//! `kl3m_data/api/loader/base.py::convert_tokenizer`: a source document's
//! tokens are only ever decode/re-encode round-tripped when the source and
//! target tokenizers actually differ, since the round trip is lossy for
//! whitespace-sensitive vocabularies.

use kl3m_core::{KlResult, Tokenizer};

/// Re-tokenizes `tokens` from `source` into `target`'s vocabulary, or
/// returns them unchanged if the two tokenizers are the same one.
pub fn convert_tokenizer(tokens: &[u32], source: &dyn Tokenizer, target: &dyn Tokenizer) -> KlResult<Vec<u32>> {
    if source.name() == target.name() {
        return Ok(tokens.to_vec());
    }
    let text = source.decode(tokens, true)?;
    target.encode(&text, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTokenizer {
        name: &'static str,
    }

    impl Tokenizer for FixedTokenizer {
        fn name(&self) -> &str {
            self.name
        }
        fn encode(&self, text: &str, _add_special_tokens: bool) -> KlResult<Vec<u32>> {
            Ok(text.bytes().map(u32::from).collect())
        }
        fn decode(&self, ids: &[u32], _skip_special_tokens: bool) -> KlResult<String> {
            Ok(ids.iter().map(|&b| b as u8 as char).collect())
        }
        fn id_of_token(&self, _token: &str) -> Option<u32> {
            None
        }
        fn vocab_size(&self) -> usize {
            256
        }
    }

    #[test]
    fn identical_tokenizers_skip_the_round_trip() {
        let t = FixedTokenizer { name: "same" };
        let tokens = vec![1, 2, 3];
        let result = convert_tokenizer(&tokens, &t, &t).unwrap();
        assert_eq!(result, tokens);
    }

    #[test]
    fn differing_tokenizers_decode_then_re_encode() {
        let source = FixedTokenizer { name: "a" };
        let target = FixedTokenizer { name: "b" };
        let tokens: Vec<u32> = "hi".bytes().map(u32::from).collect();
        let result = convert_tokenizer(&tokens, &source, &target).unwrap();
        assert_eq!(result, tokens); // both are byte-identity tokenizers here
    }
}
