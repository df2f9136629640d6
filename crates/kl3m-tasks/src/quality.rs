//! Quality scoring for the JSONL Exporter's gating step. Ported
//! verbatim from `kl3m_data/metrics/quality_metrics.py`: a fixed table of
//! expected ranges per metric, and a weighted deviation score.

use std::collections::HashMap;

/// Token ids the original treats as "no-space bigram" artifacts —
/// tokenization glitches that merge two words without a separating space.
const BAD_BIGRAM_TOKEN_IDS: [u32; 3] = [35464, 67042, 108832];

/// Token ids corresponding to stray markup/format tokens that should not
/// appear in clean text.
const BAD_FORMAT_TOKEN_IDS: [u32; 12] = [
    395, 477, 1819, 2098, 12125, 19220, 25937, 67199, 126985, 126997, 127022, 127034,
];

/// The token id for the literal `"begin"`-like start marker some scraped
/// documents leak into the token stream; used for the `startswith_begin`
/// diagnostic flag.
const BEGIN_TOKEN_ID: u32 = 47842;

/// `(weight, (lower, upper))` per metric. A `lower == upper` range means
/// "should be exactly this value"; any deviation is penalized directly
/// rather than relative to the bound.
fn metric_table() -> Vec<(&'static str, f64, (f64, f64))> {
    vec![
        ("ratio_whitespace", 1.0, (0.121212, 0.193813)),
        ("average_line_length", 1.0, (17.5, 245.0)),
        ("average_paragraph_length", 1.0, (35.0, 849.0)),
        ("ratio_alphanumeric", 1.0, (0.594595, 0.822884)),
        ("ratio_alpha_to_numeric", 0.1, (1.829268, 265.1)),
        ("ratio_non_ascii", 2.0, (0.0, 0.034483)),
        ("ratio_capital", 1.0, (0.008368, 0.224638)),
        ("ratio_punctuation", 1.0, (0.021601, 0.210867)),
        ("average_word_length", 1.5, (4.498695, 7.285714)),
        ("type_token_ratio", 1.5, (0.387879, 0.66055)),
        ("token_entropy", 0.5, (3.38158, 7.855401)),
        ("char_entropy", 0.5, (4.066784, 5.017473)),
        ("max_token_frequency_ratio", 1.0, (0.04028, 0.153846)),
        ("repetition_rate", 1.5, (0.33945, 0.612121)),
        ("ratio_format_tokens", 1.0, (0.0, 0.0)),
        ("ratio_nospace_bigrams", 2.0, (0.0, 0.0)),
    ]
}

/// Character- and token-level metrics for one document, as produced by
/// [`compute_metrics`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DocumentMetrics {
    pub total_characters: usize,
    pub ratio_whitespace: f64,
    pub num_lines: usize,
    pub average_line_length: f64,
    pub num_paragraphs: usize,
    pub average_paragraph_length: f64,
    pub ratio_alphanumeric: f64,
    pub ratio_alpha_to_numeric: f64,
    pub ratio_non_ascii: f64,
    pub ratio_capital: f64,
    pub ratio_punctuation: f64,
    pub num_words: usize,
    pub average_word_length: f64,
    pub type_token_ratio: f64,
    pub token_entropy: f64,
    pub char_entropy: f64,
    pub num_copyright: usize,
    pub num_rights_reserved: usize,
    pub total_tokens: usize,
    pub unique_tokens: usize,
    pub max_token_frequency_ratio: f64,
    pub repetition_rate: f64,
    pub ratio_nospace_bigrams: f64,
    pub ratio_format_tokens: f64,
    pub startswith_begin: bool,
}

impl DocumentMetrics {
    fn as_named_map(&self) -> HashMap<&'static str, f64> {
        let mut map = HashMap::new();
        map.insert("ratio_whitespace", self.ratio_whitespace);
        map.insert("average_line_length", self.average_line_length);
        map.insert("average_paragraph_length", self.average_paragraph_length);
        map.insert("ratio_alphanumeric", self.ratio_alphanumeric);
        map.insert("ratio_alpha_to_numeric", self.ratio_alpha_to_numeric);
        map.insert("ratio_non_ascii", self.ratio_non_ascii);
        map.insert("ratio_capital", self.ratio_capital);
        map.insert("ratio_punctuation", self.ratio_punctuation);
        map.insert("average_word_length", self.average_word_length);
        // text-level type_token_ratio/token_entropy are overwritten by the
        // token-level values below, matching the original's dict merge
        // order (`{**text_metrics, **token_metrics}`).
        map.insert("type_token_ratio", self.type_token_ratio);
        map.insert("token_entropy", self.token_entropy);
        map.insert("char_entropy", self.char_entropy);
        map.insert("max_token_frequency_ratio", self.max_token_frequency_ratio);
        map.insert("repetition_rate", self.repetition_rate);
        map.insert("ratio_format_tokens", self.ratio_format_tokens);
        map.insert("ratio_nospace_bigrams", self.ratio_nospace_bigrams);
        map
    }
}

/// Compute the weighted deviation score for a metrics record. Panics-free
/// by construction: non-finite metric values are skipped rather than
/// raising, since the Rust caller has no analogue of the original's
/// "crash loudly in a one-off analysis script" posture — a quality gate
/// inside a long-running exporter must not abort the run.
pub fn score_text(metrics: &DocumentMetrics) -> f64 {
    const EPS: f64 = 1e-8;
    let named = metrics.as_named_map();
    let mut total = 0.0;

    for (metric, weight, (lower, upper)) in metric_table() {
        let Some(&value) = named.get(metric) else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }

        let component = if (lower - upper).abs() < f64::EPSILON {
            if (value - lower).abs() > EPS {
                weight * (value - lower).abs()
            } else {
                0.0
            }
        } else if value < lower {
            weight * (lower - value) / (lower.abs() + EPS)
        } else if value > upper {
            weight * (value - upper) / (upper.abs() + EPS)
        } else {
            0.0
        };

        if component.is_finite() {
            total += component;
        }
    }

    total
}

/// `score_text(metrics) / max(1, total_tokens)`, used for cross-document
/// comparison in the exporter's quality gate.
pub fn adjusted_score(metrics: &DocumentMetrics) -> f64 {
    score_text(metrics) / (metrics.total_tokens.max(1) as f64)
}

/// Compute [`DocumentMetrics`] from decoded text and its token-id
/// sequence, in a single pass over each. Mirrors
/// `quality_metrics.py::get_metrics`.
pub fn compute_metrics(text: &str, tokens: &[u32]) -> DocumentMetrics {
    let mut metrics = DocumentMetrics::default();

    let total_chars = text.chars().count();
    metrics.total_characters = total_chars;

    if total_chars > 0 {
        let mut whitespace_count = 0usize;
        let mut alpha_count = 0usize;
        let mut digit_count = 0usize;
        let mut capital_count = 0usize;
        let mut punctuation_count = 0usize;
        let mut non_ascii_count = 0usize;
        let mut line_count = 1usize;
        let mut paragraph_count = 0usize;
        let mut char_counts: HashMap<char, usize> = HashMap::new();

        let chars: Vec<char> = text.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            *char_counts.entry(c).or_insert(0) += 1;

            if c.is_whitespace() {
                whitespace_count += 1;
                if c == '\n' {
                    line_count += 1;
                }
            }
            if c.is_alphabetic() {
                alpha_count += 1;
                if c.is_uppercase() {
                    capital_count += 1;
                }
            } else if c.is_ascii_digit() {
                digit_count += 1;
            }
            if is_ascii_punctuation(c) {
                punctuation_count += 1;
            }
            if (c as u32) > 127 {
                non_ascii_count += 1;
            }
            if c == '.' && i + 2 < total_chars {
                let pair: String = chars[i + 1..=i + 2].iter().collect();
                if pair == "\r\n" || pair == "\n\n" {
                    paragraph_count += 1;
                }
            }
        }
        paragraph_count += 1;

        let alphanumeric_count: usize = char_counts
            .iter()
            .filter(|(c, _)| c.is_alphanumeric())
            .map(|(_, count)| *count)
            .sum();

        metrics.ratio_whitespace = whitespace_count as f64 / total_chars as f64;
        metrics.ratio_alphanumeric = alphanumeric_count as f64 / total_chars as f64;
        metrics.ratio_alpha_to_numeric = if digit_count > 0 {
            alpha_count as f64 / digit_count as f64
        } else {
            f64::INFINITY
        };
        metrics.ratio_non_ascii = non_ascii_count as f64 / total_chars as f64;
        metrics.ratio_capital = if alpha_count > 0 {
            capital_count as f64 / alpha_count as f64
        } else {
            0.0
        };
        metrics.ratio_punctuation = punctuation_count as f64 / total_chars as f64;
        metrics.num_lines = line_count;
        metrics.average_line_length = total_chars as f64 / line_count as f64;
        metrics.num_paragraphs = paragraph_count;
        metrics.average_paragraph_length = total_chars as f64 / paragraph_count as f64;

        metrics.char_entropy = char_counts
            .values()
            .map(|&count| {
                let p = count as f64 / total_chars as f64;
                -p * p.log2()
            })
            .sum();

        let words: Vec<&str> = text.split_whitespace().collect();
        metrics.num_words = words.len();
        if !words.is_empty() {
            let mut word_counts: HashMap<&str, usize> = HashMap::new();
            let mut total_word_len = 0usize;
            for w in &words {
                total_word_len += w.chars().count();
                *word_counts.entry(w).or_insert(0) += 1;
            }
            metrics.average_word_length = total_word_len as f64 / words.len() as f64;
            metrics.type_token_ratio = word_counts.len() as f64 / words.len() as f64;
            metrics.token_entropy = word_counts
                .values()
                .map(|&count| {
                    let p = count as f64 / words.len() as f64;
                    -p * p.log2()
                })
                .sum();
        }

        let lower = text.to_lowercase();
        metrics.num_copyright = lower.matches("copyright").count() + lower.matches('\u{a9}').count();
        metrics.num_rights_reserved = lower.matches("rights reserved").count();
    }

    let total_tokens = tokens.len();
    metrics.total_tokens = total_tokens;
    if total_tokens > 0 {
        let mut token_counts: HashMap<u32, usize> = HashMap::new();
        let mut num_nospace_bigrams = 0usize;
        let mut num_format_tokens = 0usize;
        for &t in tokens {
            *token_counts.entry(t).or_insert(0) += 1;
            if BAD_BIGRAM_TOKEN_IDS.contains(&t) {
                num_nospace_bigrams += 1;
            }
            if BAD_FORMAT_TOKEN_IDS.contains(&t) {
                num_format_tokens += 1;
            }
        }
        let unique_tokens = token_counts.len();
        metrics.unique_tokens = unique_tokens;
        // token-level type_token_ratio/token_entropy overwrite the
        // text-level values computed above, matching the original.
        metrics.type_token_ratio = unique_tokens as f64 / total_tokens as f64;
        metrics.token_entropy = token_counts
            .values()
            .map(|&count| {
                let p = count as f64 / total_tokens as f64;
                -p * p.log2()
            })
            .sum();
        let max_freq = *token_counts.values().max().unwrap_or(&0);
        metrics.max_token_frequency_ratio = max_freq as f64 / total_tokens as f64;
        metrics.repetition_rate = 1.0 - (unique_tokens as f64 / total_tokens as f64);
        metrics.ratio_nospace_bigrams = num_nospace_bigrams as f64 / total_tokens as f64;
        metrics.ratio_format_tokens = num_format_tokens as f64 / total_tokens as f64;
        metrics.startswith_begin = tokens[0] == BEGIN_TOKEN_ID;
    }

    metrics
}

fn is_ascii_punctuation(c: char) -> bool {
    // mirrors Python's `string.punctuation`, the ASCII punctuation set.
    matches!(
        c,
        '!' | '"'
            | '#'
            | '$'
            | '%'
            | '&'
            | '\''
            | '('
            | ')'
            | '*'
            | '+'
            | ','
            | '-'
            | '.'
            | '/'
            | ':'
            | ';'
            | '<'
            | '='
            | '>'
            | '?'
            | '@'
            | '['
            | '\\'
            | ']'
            | '^'
            | '_'
            | '`'
            | '{'
            | '|'
            | '}'
            | '~'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_zeroed_metrics_and_zero_score() {
        let metrics = compute_metrics("", &[]);
        assert_eq!(metrics.total_characters, 0);
        assert_eq!(metrics.total_tokens, 0);
        assert_eq!(score_text(&metrics), 0.0);
    }

    #[test]
    fn score_is_zero_for_a_metrics_record_within_every_range() {
        let mut metrics = DocumentMetrics::default();
        metrics.ratio_whitespace = 0.15;
        metrics.average_line_length = 100.0;
        metrics.average_paragraph_length = 400.0;
        metrics.ratio_alphanumeric = 0.7;
        metrics.ratio_alpha_to_numeric = 10.0;
        metrics.ratio_non_ascii = 0.0;
        metrics.ratio_capital = 0.05;
        metrics.ratio_punctuation = 0.1;
        metrics.average_word_length = 5.5;
        metrics.type_token_ratio = 0.5;
        metrics.token_entropy = 5.0;
        metrics.char_entropy = 4.5;
        metrics.max_token_frequency_ratio = 0.08;
        metrics.repetition_rate = 0.45;
        metrics.ratio_format_tokens = 0.0;
        metrics.ratio_nospace_bigrams = 0.0;
        assert_eq!(score_text(&metrics), 0.0);
    }

    #[test]
    fn score_penalizes_nonzero_should_be_zero_metrics() {
        let mut metrics = DocumentMetrics::default();
        metrics.ratio_format_tokens = 0.1;
        let score = score_text(&metrics);
        assert!(score > 0.0);
    }

    #[test]
    fn detects_bad_bigram_and_format_tokens() {
        let metrics = compute_metrics("hello world", &[35464, 1, 2, 477]);
        assert!(metrics.ratio_nospace_bigrams > 0.0);
        assert!(metrics.ratio_format_tokens > 0.0);
    }

    #[test]
    fn startswith_begin_flag_is_set_from_first_token() {
        let metrics = compute_metrics("hello", &[47842, 1, 2]);
        assert!(metrics.startswith_begin);
        let metrics = compute_metrics("hello", &[1, 47842, 2]);
        assert!(!metrics.startswith_begin);
    }
}
