//! Content-prefix deduplication, keyed on a hash of the leading tokens (or
//! characters, in text mode) of each exported record. Grounded on
//! `parquet_to_jsonl.py`'s dedup set, guarded there by a single lock
//! shared across the fetcher pool.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

pub const DEFAULT_TOKEN_PREFIX_LEN: usize = 1024;
pub const DEFAULT_CHAR_PREFIX_LEN: usize = 1000;

fn hash_tokens(tokens: &[u32], prefix_len: usize) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    tokens[..tokens.len().min(prefix_len)].hash(&mut hasher);
    hasher.finish()
}

fn hash_text(text: &str, prefix_len: usize) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    let prefix: String = text.chars().take(prefix_len).collect();
    prefix.hash(&mut hasher);
    hasher.finish()
}

/// A dedup set shared by all fetchers, protected by a single mutex as in
/// the original (a dedicated lock-free structure would be overkill for
/// the exporter's fetch-rate).
pub struct DedupSet {
    seen: Mutex<HashSet<u64>>,
    token_prefix_len: usize,
    char_prefix_len: usize,
}

impl DedupSet {
    pub fn new(token_prefix_len: usize, char_prefix_len: usize) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            token_prefix_len,
            char_prefix_len,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TOKEN_PREFIX_LEN, DEFAULT_CHAR_PREFIX_LEN)
    }

    /// Returns `true` if `tokens` is new (and records it), `false` if it is
    /// a duplicate of something already seen.
    pub fn check_tokens(&self, tokens: &[u32]) -> bool {
        let key = hash_tokens(tokens, self.token_prefix_len);
        self.seen.lock().expect("dedup set mutex poisoned").insert(key)
    }

    /// As [`Self::check_tokens`] but keyed on decoded text.
    pub fn check_text(&self, text: &str) -> bool {
        let key = hash_text(text, self.char_prefix_len);
        self.seen.lock().expect("dedup set mutex poisoned").insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().expect("dedup set mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_token_prefixes_are_flagged_as_duplicates() {
        let set = DedupSet::with_defaults();
        assert!(set.check_tokens(&[1, 2, 3]));
        assert!(!set.check_tokens(&[1, 2, 3]));
    }

    #[test]
    fn token_dedup_only_considers_the_configured_prefix() {
        let set = DedupSet::new(2, 1000);
        assert!(set.check_tokens(&[1, 2, 999]));
        assert!(!set.check_tokens(&[1, 2, 111])); // same first 2 tokens
        assert!(set.check_tokens(&[1, 3, 999])); // differs within prefix
    }

    #[test]
    fn text_dedup_is_independent_of_token_dedup() {
        let set = DedupSet::with_defaults();
        assert!(set.check_text("hello world"));
        assert!(!set.check_text("hello world"));
        assert!(set.check_tokens(&[1, 2, 3]));
        assert_eq!(set.len(), 2);
    }
}
