use serde::{Deserialize, Serialize};

/// Tuning for common-ancestor search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AncestryConfig {
    /// Number of commits of the right-hand history loaded into the lookup
    /// set per search round.
    pub partition_size: usize,
}

impl Default for AncestryConfig {
    fn default() -> Self {
        Self {
            partition_size: 1000,
        }
    }
}

impl AncestryConfig {
    pub fn with_partition_size(partition_size: usize) -> Self {
        Self { partition_size }
    }
}
