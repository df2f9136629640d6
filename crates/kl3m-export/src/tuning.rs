//! Host-resource-driven auto-tuning of exporter concurrency, mirroring
//! `parquet_to_jsonl.py`'s use of `os.cpu_count()` and `psutil` to derive
//! worker counts before falling back to fixed defaults.

use sysinfo::{System, SystemExt};

/// Hard ceilings no auto-tuned value may exceed, and the floor below which
/// auto-tuning never drops (a single-core container still gets workers).
const MAX_FETCHERS: usize = 64;
const MAX_QUEUE_DEPTH: usize = 8192;
const MIN_FETCHERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportConcurrency {
    pub fetchers: usize,
    pub queue_depth: usize,
    pub writer_buffer_records: usize,
}

impl ExportConcurrency {
    /// Fixed, non-tuned defaults: a conservative baseline usable without
    /// ever inspecting the host.
    pub fn fixed_defaults() -> Self {
        Self {
            fetchers: 8,
            queue_depth: 1024,
            writer_buffer_records: 256,
        }
    }

    /// Derives concurrency from CPU count and available memory. The
    /// mapping is deterministic for a given `(cpus, available_memory_bytes)`
    /// pair, so repeated calls on the same host always agree.
    pub fn auto_tune(cpus: usize, available_memory_bytes: u64) -> Self {
        let fetchers = cpus.saturating_mul(2).clamp(MIN_FETCHERS, MAX_FETCHERS);

        // Budget roughly 64KiB of queue slack per fetcher per GiB of free
        // memory, capped hard regardless of how much memory is reported.
        let memory_gib = (available_memory_bytes / (1 << 30)).max(1) as usize;
        let queue_depth = (fetchers * memory_gib * 32).clamp(128, MAX_QUEUE_DEPTH);

        let writer_buffer_records = (queue_depth / 4).max(64);

        Self {
            fetchers,
            queue_depth,
            writer_buffer_records,
        }
    }

    /// Reads the current host's CPU count and available memory via
    /// `sysinfo` and derives concurrency from them.
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let cpus = num_cpus::get();
        let available_memory_bytes = sys.available_memory().max(1);
        Self::auto_tune(cpus, available_memory_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_tune_scales_with_cpu_count_but_respects_the_ceiling() {
        let small = ExportConcurrency::auto_tune(2, 4 << 30);
        let huge = ExportConcurrency::auto_tune(256, 256 << 30);
        assert!(small.fetchers < huge.fetchers);
        assert!(huge.fetchers <= MAX_FETCHERS);
        assert!(huge.queue_depth <= MAX_QUEUE_DEPTH);
    }

    #[test]
    fn auto_tune_is_deterministic_for_the_same_signature() {
        let a = ExportConcurrency::auto_tune(8, 16 << 30);
        let b = ExportConcurrency::auto_tune(8, 16 << 30);
        assert_eq!(a, b);
    }

    #[test]
    fn auto_tune_never_drops_below_the_floor_on_a_single_core_host() {
        let tiny = ExportConcurrency::auto_tune(1, 256 << 20);
        assert!(tiny.fetchers >= MIN_FETCHERS);
    }
}
