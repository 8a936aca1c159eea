//! In-memory context source

use parking_lot::RwLock;

use crate::error::{ContextError, ContextResult};
use crate::source::{ClusterConfig, ContextEntry, ContextSource};

/// A context source held in memory.
///
/// Useful for tests and for embedding kubescope without a kubeconfig file.
/// The configuration can be replaced or made unreadable at runtime.
#[derive(Debug)]
pub struct StaticSource {
    config: RwLock<Result<ClusterConfig, String>>,
}

impl StaticSource {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config: RwLock::new(Ok(config)),
        }
    }

    /// Contexts named `names`, the first one current
    pub fn with_contexts<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let contexts: Vec<ContextEntry> = names.into_iter().map(ContextEntry::new).collect();
        let current_context = contexts.first().map(|c| c.name.clone());
        Self::new(ClusterConfig {
            contexts,
            current_context,
        })
    }

    pub fn set(&self, config: ClusterConfig) {
        *self.config.write() = Ok(config);
    }

    /// Make every subsequent load fail
    pub fn set_unavailable(&self, reason: impl Into<String>) {
        *self.config.write() = Err(reason.into());
    }
}

impl Default for StaticSource {
    fn default() -> Self {
        Self::new(ClusterConfig::default())
    }
}

impl ContextSource for StaticSource {
    fn load(&self) -> ContextResult<ClusterConfig> {
        self.config
            .read()
            .clone()
            .map_err(ContextError::ConfigUnavailable)
    }

    fn describe(&self) -> String {
        "in-memory configuration".to_string()
    }
}
