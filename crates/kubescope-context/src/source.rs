//! Cluster configuration sources

use serde::{Deserialize, Serialize};

use crate::error::ContextResult;

/// Namespace used when a context does not declare one
pub const DEFAULT_NAMESPACE: &str = "default";

/// One context as declared by the configuration source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ContextEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>, server: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self.server = Some(server.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Snapshot of a configuration source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub contexts: Vec<ContextEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,
}

/// Where contexts come from
pub trait ContextSource: Send + Sync {
    /// Read the configuration. Fails with `ConfigUnavailable` when unreadable.
    fn load(&self) -> ContextResult<ClusterConfig>;

    /// Human-readable origin, for logs and diagnostics
    fn describe(&self) -> String;
}
