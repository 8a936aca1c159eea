//! Context registry
//!
//! The single owner of "which cluster, which namespace". Every read of the
//! active session and every mutation goes through one lock, so concurrent
//! switches resolve to exactly one caller's result.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use kubescope_core::limits::validate_namespace;

use crate::error::{ContextError, ContextResult};
use crate::source::{ClusterConfig, ContextEntry, ContextSource, DEFAULT_NAMESPACE};

/// A known cluster context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_endpoint: Option<String>,
    pub default_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_namespace: Option<String>,
}

impl ContextDescriptor {
    fn from_entry(entry: &ContextEntry) -> Self {
        Self {
            name: entry.name.clone(),
            cluster_name: entry.cluster.clone(),
            cluster_endpoint: entry.server.clone(),
            default_namespace: entry
                .namespace
                .clone()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            last_accessed_namespace: None,
        }
    }

    /// Namespace a switch to this context lands in
    pub fn effective_namespace(&self) -> &str {
        self.last_accessed_namespace
            .as_deref()
            .unwrap_or(&self.default_namespace)
    }
}

/// The process-wide current context and namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub context: String,
    pub namespace: String,
}

/// What a reload changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Set when the active context disappeared and the session moved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_changed_to: Option<String>,
}

struct RegistryState {
    contexts: BTreeMap<String, ContextDescriptor>,
    active: ActiveSession,
}

/// Registry of cluster contexts plus the active session
pub struct ContextRegistry {
    source: Arc<dyn ContextSource>,
    state: RwLock<RegistryState>,
}

impl ContextRegistry {
    /// Load contexts from `source`. The session starts on the configuration's
    /// current context, or the first context if none is marked current.
    pub fn new(source: Arc<dyn ContextSource>) -> ContextResult<Self> {
        let config = source.load()?;
        let contexts = descriptors(&config);
        let initial = initial_context(&config, &contexts).ok_or(ContextError::NoContexts)?;
        let active = ActiveSession {
            namespace: contexts[&initial].effective_namespace().to_string(),
            context: initial,
        };

        tracing::info!(
            "Loaded {} contexts from {} (active: {}/{})",
            contexts.len(),
            source.describe(),
            active.context,
            active.namespace
        );

        Ok(Self {
            source,
            state: RwLock::new(RegistryState { contexts, active }),
        })
    }

    /// All known contexts.
    ///
    /// Checks that the configuration is still readable but does not merge
    /// changes into the registry; use [`reload`](Self::reload) for that.
    pub fn list_contexts(&self) -> ContextResult<Vec<ContextDescriptor>> {
        self.source.load()?;
        Ok(self.state.read().contexts.values().cloned().collect())
    }

    /// The active session. Never fails.
    pub fn get_current(&self) -> ActiveSession {
        self.state.read().active.clone()
    }

    pub fn current_context_name(&self) -> String {
        self.state.read().active.context.clone()
    }

    pub fn get_context(&self, name: &str) -> ContextResult<ContextDescriptor> {
        self.state
            .read()
            .contexts
            .get(name)
            .cloned()
            .ok_or_else(|| ContextError::UnknownContext(name.to_string()))
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.state.read().active.context == name
    }

    /// Make `name` the active context, landing in its last-used namespace
    pub fn switch_context(&self, name: &str) -> ContextResult<ContextDescriptor> {
        let mut state = self.state.write();
        let descriptor = state
            .contexts
            .get(name)
            .cloned()
            .ok_or_else(|| ContextError::UnknownContext(name.to_string()))?;

        let previous = std::mem::replace(
            &mut state.active,
            ActiveSession {
                context: descriptor.name.clone(),
                namespace: descriptor.effective_namespace().to_string(),
            },
        );
        tracing::info!(
            "Switched context {}/{} -> {}/{}",
            previous.context,
            previous.namespace,
            state.active.context,
            state.active.namespace
        );
        Ok(descriptor)
    }

    /// Remember `namespace` for context `name`; follows into the session if `name` is active
    pub fn set_namespace_for_context(&self, name: &str, namespace: &str) -> ContextResult<()> {
        let mut state = self.state.write();
        let descriptor = state
            .contexts
            .get_mut(name)
            .ok_or_else(|| ContextError::UnknownContext(name.to_string()))?;
        validate_namespace(namespace)?;
        descriptor.last_accessed_namespace = Some(namespace.to_string());

        if state.active.context == name {
            state.active.namespace = namespace.to_string();
        }
        tracing::debug!("Namespace for context {} set to {}", name, namespace);
        Ok(())
    }

    /// Resolve a per-call override against the active session without changing it.
    ///
    /// An explicit context must be known; its namespace defaults to that
    /// context's effective namespace rather than the active one.
    pub fn resolve(&self, context: Option<&str>, namespace: Option<&str>) -> ContextResult<ActiveSession> {
        let state = self.state.read();
        let mut session = match context {
            Some(name) if name != state.active.context => {
                let descriptor = state
                    .contexts
                    .get(name)
                    .ok_or_else(|| ContextError::UnknownContext(name.to_string()))?;
                ActiveSession {
                    context: descriptor.name.clone(),
                    namespace: descriptor.effective_namespace().to_string(),
                }
            }
            _ => state.active.clone(),
        };
        if let Some(ns) = namespace {
            validate_namespace(ns)?;
            session.namespace = ns.to_string();
        }
        Ok(session)
    }

    /// Re-read the source and merge: new contexts are added, vanished ones
    /// removed, and surviving contexts keep their last-used namespace.
    pub fn reload(&self) -> ContextResult<ReloadSummary> {
        let config = self.source.load()?;
        let mut fresh = descriptors(&config);
        if fresh.is_empty() {
            return Err(ContextError::NoContexts);
        }

        let mut state = self.state.write();
        let mut summary = ReloadSummary::default();

        for (name, descriptor) in fresh.iter_mut() {
            match state.contexts.get(name) {
                Some(existing) => descriptor.last_accessed_namespace = existing.last_accessed_namespace.clone(),
                None => summary.added.push(name.clone()),
            }
        }
        summary.removed = state
            .contexts
            .keys()
            .filter(|name| !fresh.contains_key(*name))
            .cloned()
            .collect();

        if !fresh.contains_key(&state.active.context) {
            if let Some(next) = initial_context(&config, &fresh) {
                tracing::warn!(
                    "Active context {} was removed, switching to {}",
                    state.active.context,
                    next
                );
                state.active = ActiveSession {
                    namespace: fresh[&next].effective_namespace().to_string(),
                    context: next.clone(),
                };
                summary.active_changed_to = Some(next);
            }
        }
        state.contexts = fresh;

        tracing::info!(
            "Reloaded contexts: {} added, {} removed",
            summary.added.len(),
            summary.removed.len()
        );
        Ok(summary)
    }

    pub fn source(&self) -> &dyn ContextSource {
        self.source.as_ref()
    }
}

fn descriptors(config: &ClusterConfig) -> BTreeMap<String, ContextDescriptor> {
    config
        .contexts
        .iter()
        .filter(|entry| !entry.name.is_empty())
        .map(|entry| (entry.name.clone(), ContextDescriptor::from_entry(entry)))
        .collect()
}

fn initial_context(config: &ClusterConfig, contexts: &BTreeMap<String, ContextDescriptor>) -> Option<String> {
    config
        .current_context
        .as_ref()
        .filter(|name| contexts.contains_key(*name))
        .cloned()
        .or_else(|| config.contexts.iter().find(|c| contexts.contains_key(&c.name)).map(|c| c.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::StaticSource;

    fn source() -> Arc<StaticSource> {
        Arc::new(StaticSource::new(ClusterConfig {
            contexts: vec![
                ContextEntry::new("dev").with_cluster("dev-cluster", "https://dev:6443"),
                ContextEntry::new("prod")
                    .with_cluster("prod-cluster", "https://prod:6443")
                    .with_namespace("payments"),
            ],
            current_context: Some("prod".to_string()),
        }))
    }

    fn registry() -> (Arc<StaticSource>, ContextRegistry) {
        let source = source();
        let registry = ContextRegistry::new(source.clone()).unwrap();
        (source, registry)
    }

    #[test]
    fn test_initial_session() {
        let (_, registry) = registry();
        let current = registry.get_current();
        assert_eq!(current.context, "prod");
        assert_eq!(current.namespace, "payments");
        assert_eq!(registry.list_contexts().unwrap().len(), 2);
    }

    #[test]
    fn test_initial_falls_back_to_first_context() {
        let source = Arc::new(StaticSource::with_contexts(["b", "a"]));
        source.set(ClusterConfig {
            current_context: Some("missing".to_string()),
            ..source.load().unwrap()
        });
        let registry = ContextRegistry::new(source).unwrap();
        assert_eq!(registry.current_context_name(), "b");
        assert_eq!(registry.get_current().namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_empty_config() {
        let source = Arc::new(StaticSource::default());
        assert!(matches!(ContextRegistry::new(source), Err(ContextError::NoContexts)));
    }

    #[test]
    fn test_switch_context() {
        let (_, registry) = registry();
        let descriptor = registry.switch_context("dev").unwrap();
        assert_eq!(descriptor.cluster_endpoint.as_deref(), Some("https://dev:6443"));
        assert_eq!(
            registry.get_current(),
            ActiveSession {
                context: "dev".to_string(),
                namespace: "default".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_context_leaves_session_unchanged() {
        let (_, registry) = registry();
        let before = registry.get_current();

        let err = registry.switch_context("does-not-exist").unwrap_err();
        assert_eq!(err, ContextError::UnknownContext("does-not-exist".to_string()));
        assert!(err.to_string().contains("does-not-exist"));
        assert_eq!(registry.get_current(), before);
    }

    #[test]
    fn test_switch_to_any_listed_context() {
        let arn = format!("arn:aws:eks:us-east-1:123456789012:cluster/{}", "x".repeat(260));
        let source = Arc::new(StaticSource::with_contexts(["dev".to_string(), arn.clone()]));
        let registry = ContextRegistry::new(source).unwrap();

        let listed = registry.list_contexts().unwrap();
        assert!(listed.iter().any(|c| c.name == arn));
        assert_eq!(registry.switch_context(&arn).unwrap().name, arn);
        assert_eq!(registry.current_context_name(), arn);

        assert_eq!(
            registry.switch_context("").unwrap_err(),
            ContextError::UnknownContext(String::new())
        );
        assert_eq!(registry.current_context_name(), arn);
    }

    #[test]
    fn test_unknown_context_reported_before_bad_namespace() {
        let (_, registry) = registry();
        assert_eq!(
            registry.set_namespace_for_context("ghost", "Bad_NS").unwrap_err(),
            ContextError::UnknownContext("ghost".to_string())
        );
        assert_eq!(
            registry.resolve(Some("ghost"), Some("Bad_NS")).unwrap_err(),
            ContextError::UnknownContext("ghost".to_string())
        );
        assert!(matches!(
            registry.set_namespace_for_context("dev", "Bad_NS"),
            Err(ContextError::Invalid(_))
        ));
    }

    #[test]
    fn test_set_namespace_for_inactive_context() {
        let (_, registry) = registry();
        registry.set_namespace_for_context("dev", "tools").unwrap();

        assert_eq!(registry.get_current().namespace, "payments");
        registry.switch_context("dev").unwrap();
        assert_eq!(registry.get_current().namespace, "tools");
    }

    #[test]
    fn test_set_namespace_for_active_context() {
        let (_, registry) = registry();
        registry.set_namespace_for_context("prod", "ledger").unwrap();
        assert_eq!(registry.get_current().namespace, "ledger");

        registry.switch_context("dev").unwrap();
        registry.switch_context("prod").unwrap();
        assert_eq!(registry.get_current().namespace, "ledger");
        assert_eq!(registry.get_context("prod").unwrap().default_namespace, "payments");
    }

    #[test]
    fn test_set_namespace_errors() {
        let (_, registry) = registry();
        assert!(matches!(
            registry.set_namespace_for_context("nope", "x"),
            Err(ContextError::UnknownContext(_))
        ));
        assert!(matches!(
            registry.set_namespace_for_context("dev", "Not_Valid"),
            Err(ContextError::Invalid(_))
        ));
        assert_eq!(registry.get_context("dev").unwrap().last_accessed_namespace, None);
    }

    #[test]
    fn test_resolve_overrides() {
        let (_, registry) = registry();

        let current = registry.resolve(None, None).unwrap();
        assert_eq!(current, registry.get_current());

        let other = registry.resolve(Some("dev"), None).unwrap();
        assert_eq!(other.context, "dev");
        assert_eq!(other.namespace, "default");

        let scoped = registry.resolve(None, Some("kube-system")).unwrap();
        assert_eq!(scoped.context, "prod");
        assert_eq!(scoped.namespace, "kube-system");

        assert!(registry.resolve(Some("ghost"), None).is_err());
        assert_eq!(registry.current_context_name(), "prod");
    }

    #[test]
    fn test_unreadable_source() {
        let (source, registry) = registry();
        source.set_unavailable("permission denied");

        assert!(matches!(registry.list_contexts(), Err(ContextError::ConfigUnavailable(_))));
        assert_eq!(registry.get_current().context, "prod");
        assert!(registry.switch_context("dev").is_ok());
    }

    #[test]
    fn test_reload_merges() {
        let (source, registry) = registry();
        registry.set_namespace_for_context("dev", "tools").unwrap();

        source.set(ClusterConfig {
            contexts: vec![ContextEntry::new("dev"), ContextEntry::new("qa")],
            current_context: Some("qa".to_string()),
        });

        let summary = registry.reload().unwrap();
        assert_eq!(summary.added, vec!["qa".to_string()]);
        assert_eq!(summary.removed, vec!["prod".to_string()]);
        assert_eq!(summary.active_changed_to.as_deref(), Some("qa"));
        assert_eq!(registry.get_context("dev").unwrap().last_accessed_namespace.as_deref(), Some("tools"));
        assert_eq!(registry.get_current().context, "qa");
    }

    #[test]
    fn test_reload_to_empty_keeps_state() {
        let (source, registry) = registry();
        source.set(ClusterConfig::default());
        assert!(matches!(registry.reload(), Err(ContextError::NoContexts)));
        assert_eq!(registry.list_contexts().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_switches_never_tear() {
        let names: Vec<String> = (0..16).map(|i| format!("ctx-{}", i)).collect();
        let config = ClusterConfig {
            contexts: names
                .iter()
                .map(|n| ContextEntry::new(n.clone()).with_namespace(format!("ns-{}", n)))
                .collect(),
            current_context: None,
        };
        let registry = Arc::new(ContextRegistry::new(Arc::new(StaticSource::new(config))).unwrap());

        for _ in 0..20 {
            let handles: Vec<_> = names
                .iter()
                .cloned()
                .map(|name| {
                    let registry = Arc::clone(&registry);
                    tokio::spawn(async move { registry.switch_context(&name).map(|_| ()) })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            let current = registry.get_current();
            assert!(names.contains(&current.context));
            assert_eq!(current.namespace, format!("ns-{}", current.context));
        }
    }
}
