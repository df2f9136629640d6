//! Fixed-length windowing and padding of a [`ProcessedSample`] into one or
//! more training samples. Ported from
//! `kl3m_data/api/loader/task/base.py::BaseTask.generate_padded_samples`.
//!
//! The original slices each chunk as `input_ids[i : i + sequence_length]`
//! while advancing by a stride of `sequence_length - 2`, which makes every
//! non-final chunk `sequence_length` tokens wide before the two wrapper
//! tokens are even added — two tokens too long for the declared output
//! width, and in conflict with `push_samples`'s own
//! `assert len(sample[key]) == self.sequence_length`. This port slices each
//! chunk at exactly the stride width instead, so every wrapped-and-padded
//! sample is exactly `sequence_length` tokens, matching that assertion.

use crate::task::{ProcessedSample, TaskKind};
use kl3m_core::LABEL_MASK_ID;

/// One fixed-length, fully padded training sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowedSample {
    pub input_ids: Vec<u32>,
    pub labels: Vec<i64>,
    pub attention_mask: Vec<u8>,
    pub token_type_ids: Vec<u8>,
    pub task: TaskKind,
}

/// Splits `sample` into `sequence_length`-token windows, wrapping each with
/// `start_sequence`/`end_sequence` and padding with `pad_token_id`.
pub fn window_sample(
    sample: &ProcessedSample,
    sequence_length: usize,
    start_sequence: u32,
    end_sequence: u32,
    pad_token_id: u32,
) -> Vec<WindowedSample> {
    assert!(sequence_length > 2, "sequence_length must leave room for the two wrapper tokens");
    let stride = sequence_length - 2;
    let len = sample.input_ids.len();
    if len == 0 {
        return Vec::new();
    }

    let mut windows = Vec::with_capacity(len.div_ceil(stride).max(1));
    let mut chunk_index = 0;
    while chunk_index < len {
        let end = (chunk_index + stride).min(len);
        let chunk_input = &sample.input_ids[chunk_index..end];
        let chunk_labels = &sample.labels[chunk_index..end];
        let chunk_length = chunk_input.len();
        let pad_length = stride - chunk_length;

        let mut input_ids = Vec::with_capacity(sequence_length);
        input_ids.push(start_sequence);
        input_ids.extend_from_slice(chunk_input);
        input_ids.push(end_sequence);
        input_ids.extend(std::iter::repeat(pad_token_id).take(pad_length));

        let mut labels = Vec::with_capacity(sequence_length);
        labels.push(LABEL_MASK_ID);
        labels.extend_from_slice(chunk_labels);
        labels.push(LABEL_MASK_ID);
        labels.extend(std::iter::repeat(LABEL_MASK_ID).take(pad_length));

        let mut attention_mask = vec![1u8; chunk_length + 2];
        attention_mask.extend(std::iter::repeat(0u8).take(pad_length));

        let token_type_ids = vec![0u8; sequence_length];

        debug_assert_eq!(input_ids.len(), sequence_length);
        debug_assert_eq!(labels.len(), sequence_length);
        debug_assert_eq!(attention_mask.len(), sequence_length);

        windows.push(WindowedSample {
            input_ids,
            labels,
            attention_mask,
            token_type_ids,
            task: sample.task,
        });

        chunk_index += stride;
    }

    windows
}

/// The sanity gate `push_samples` applies before pushing a sample to a
/// queue: at least 1% of positions must be attended-to, and at least 1%
/// must carry a real (non-ignored) label.
pub fn passes_sanity_gate(sample: &WindowedSample, sequence_length: usize) -> bool {
    let min_count = (0.01 * sequence_length as f64).ceil() as usize;
    let attended: usize = sample.attention_mask.iter().map(|&b| b as usize).sum();
    let labeled = sample.labels.iter().filter(|&&l| l >= 0).count();
    attended >= min_count && labeled >= min_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::process_clm;

    #[test]
    fn single_short_chunk_is_padded_to_sequence_length() {
        let sample = &process_clm(&[1, 2, 3])[0];
        let windows = window_sample(sample, 10, 100, 101, 0);
        assert_eq!(windows.len(), 1);
        let w = &windows[0];
        assert_eq!(w.input_ids.len(), 10);
        assert_eq!(w.input_ids, vec![100, 1, 2, 3, 101, 0, 0, 0, 0, 0]);
        assert_eq!(w.labels, vec![-100, 1, 2, 3, -100, -100, -100, -100, -100, -100]);
        assert_eq!(w.attention_mask, vec![1, 1, 1, 1, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn long_input_splits_into_multiple_exact_length_windows() {
        let tokens: Vec<u32> = (0..25).collect();
        let sample = &process_clm(&tokens)[0];
        let windows = window_sample(sample, 10, 100, 101, 0);
        // stride = 8; chunks at 0..8, 8..16, 16..24, 24..25
        assert_eq!(windows.len(), 4);
        for w in &windows {
            assert_eq!(w.input_ids.len(), 10);
            assert_eq!(w.labels.len(), 10);
            assert_eq!(w.attention_mask.len(), 10);
        }
        // final window has only 1 real token plus wrappers, heavily padded
        let last = windows.last().unwrap();
        assert_eq!(last.attention_mask.iter().map(|&b| b as usize).sum::<usize>(), 3);
    }

    #[test]
    fn sanity_gate_rejects_all_padding_window() {
        let sample = &process_clm(&[1])[0];
        let windows = window_sample(sample, 200, 100, 101, 0);
        assert!(!passes_sanity_gate(&windows[0], 200));
    }

    #[test]
    fn sanity_gate_accepts_a_well_populated_window() {
        let tokens: Vec<u32> = (0..20).collect();
        let sample = &process_clm(&tokens)[0];
        let windows = window_sample(sample, 10, 100, 101, 0);
        assert!(passes_sanity_gate(&windows[0], 10));
    }
}
