use serde::{Deserialize, Serialize};

/// Tuning for tree builders.
///
/// None of these settings affect tree ids: the canonical form of a tree is
/// fixed by the structural constants in `gv_store::storage_order`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Number of buffered changes at which a builder normalizes without
    /// waiting for `build()`.
    pub split_threshold: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            split_threshold: 100_000,
        }
    }
}

impl TreeConfig {
    /// A configuration that normalizes after every `threshold` changes.
    pub fn with_split_threshold(threshold: usize) -> Self {
        Self {
            split_threshold: threshold.max(1),
        }
    }
}
