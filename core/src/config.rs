//! Per-index tuning knobs.
//!
//! An [`IndexConfig`] is built once by the host (from CLI flags, its own
//! config file, or [`IndexConfig::default`]) and handed to the store.

use serde::{Deserialize, Serialize};

/// Okapi BM25 term-frequency saturation point.
pub const DEFAULT_K1: f64 = 1.5;

/// Okapi BM25 length-normalization strength. 0.0 disables it, 1.0 applies it fully.
pub const DEFAULT_B: f64 = 0.75;

/// Floor returned for a term that does not occur in a document.
pub const TF_EPSILON: f64 = 1e-9;

/// When inverse document frequencies are (re)computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdfPolicy {
    /// Computed once, when a term is first seen, against the corpus size at that
    /// moment. Later inserts never touch it.
    #[default]
    Frozen,
    /// Every IDF is refreshed as `ln(N / df)` after each insert.
    Recompute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub k1: f64,
    pub b: f64,
    pub idf_policy: IdfPolicy,
    /// Scoring pool size; `None` uses every available core.
    pub threads: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { k1: DEFAULT_K1, b: DEFAULT_B, idf_policy: IdfPolicy::Frozen, threads: None }
    }
}

impl IndexConfig {
    pub fn with_idf_policy(mut self, policy: IdfPolicy) -> Self {
        self.idf_policy = policy;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    pub(crate) fn pool_size(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}
