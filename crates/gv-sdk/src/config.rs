//! Repository configuration.

use gv_dag::AncestryConfig;
use gv_tree::TreeConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Settings for a [`Repository`](crate::Repository), loadable from TOML:
///
/// ```toml
/// author_name = "Jane Mapper"
/// author_email = "jane@example.com"
///
/// [tree]
/// split_threshold = 50000
///
/// [ancestry]
/// partition_size = 500
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Default author of new commits.
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub tree: TreeConfig,
    pub ancestry: AncestryConfig,
}

impl RepositoryConfig {
    pub fn with_author(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            author_name: Some(name.into()),
            author_email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn from_toml(text: &str) -> SdkResult<Self> {
        toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> SdkResult<String> {
        toml::to_string(self).map_err(|e| SdkError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_partial_toml() {
        let config = RepositoryConfig::from_toml(
            "author_name = \"jane\"\n[ancestry]\npartition_size = 5\n",
        )
        .unwrap();
        assert_eq!(config.author_name.as_deref(), Some("jane"));
        assert_eq!(config.author_email, None);
        assert_eq!(config.ancestry.partition_size, 5);
        assert_eq!(config.tree, TreeConfig::default());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = RepositoryConfig::with_author("jane", "jane@example.com");
        config.tree = TreeConfig::with_split_threshold(10);
        let text = config.to_toml().unwrap();
        assert_eq!(RepositoryConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            RepositoryConfig::from_toml("tree = 3"),
            Err(SdkError::Config(_))
        ));
    }
}
