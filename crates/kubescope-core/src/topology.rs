//! Topology service
//!
//! Owns the visible graph. A refresh fetches raw resources through a
//! [`ResourceSource`], normalizes them, builds edges and runs layout on a
//! blocking worker, then commits the result only if no newer refresh has
//! started in the meantime. Consumers pull the latest snapshot with
//! [`TopologyService::current`] or wait on [`TopologyService::subscribe`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::edge::GraphEdge;
use crate::error::{Error, Result};
use crate::layout::{GraphNode, LayoutConfig, LayoutEngine, LayoutReport, Position};
use crate::limits::validate_resource_count;
use crate::normalize::{normalize_with_report, NormalizeReport};
use crate::relationship::RelationshipBuilder;
use crate::resource::{NormalizedResource, ResourceKind};

/// Kinds fetched when a scope does not name any
pub const DEFAULT_KINDS: &[ResourceKind] = &[
    ResourceKind::Node,
    ResourceKind::Deployment,
    ResourceKind::ReplicaSet,
    ResourceKind::StatefulSet,
    ResourceKind::DaemonSet,
    ResourceKind::Pod,
    ResourceKind::Service,
    ResourceKind::Ingress,
    ResourceKind::ConfigMap,
    ResourceKind::PersistentVolumeClaim,
    ResourceKind::PersistentVolume,
    ResourceKind::HorizontalPodAutoscaler,
];

/// Producer of raw API query results
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Fetch the raw list response for one kind
    async fn fetch(&self, kind: ResourceKind, scope: &FetchScope) -> Result<Value>;
}

/// What to fetch for one refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchScope {
    /// Context override; `None` uses the active context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Namespace filter; `None` means all namespaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Kinds to fetch; empty means [`DEFAULT_KINDS`]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<ResourceKind>,
}

impl FetchScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_kinds(mut self, kinds: Vec<ResourceKind>) -> Self {
        self.kinds = kinds;
        self
    }

    /// The kinds this scope fetches, deduplicated and in order
    pub fn effective_kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<ResourceKind> = if self.kinds.is_empty() {
            DEFAULT_KINDS.to_vec()
        } else {
            self.kinds.clone()
        };
        let mut seen = Vec::with_capacity(kinds.len());
        kinds.retain(|k| {
            if seen.contains(k) {
                false
            } else {
                seen.push(*k);
                true
            }
        });
        kinds
    }

    fn same_view(&self, other: &FetchScope) -> bool {
        self.context == other.context && self.namespace == other.namespace
    }
}

/// A kind whose fetch failed during a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchError {
    pub kind: ResourceKind,
    pub message: String,
}

/// An immutable, positioned graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub generation: u64,
    pub scope: FetchScope,
    pub built_at: DateTime<Utc>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Raw records that could not be normalized
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetch_errors: Vec<FetchError>,
    pub layout: LayoutReport,
}

impl GraphSnapshot {
    /// Build edges and lay out `resources`. Later duplicates of an id replace earlier ones.
    pub fn build(
        resources: impl IntoIterator<Item = NormalizedResource>,
        engine: &LayoutEngine,
        prior: &HashMap<String, Position>,
    ) -> Self {
        let index: BTreeMap<String, NormalizedResource> = resources.into_iter().map(|r| (r.id.clone(), r)).collect();
        let edges = RelationshipBuilder::build_edges(&index);
        let mut nodes: Vec<GraphNode> = index.into_values().map(GraphNode::from).collect();

        let layout = if prior.is_empty() {
            engine.layout(&mut nodes, &edges)
        } else {
            engine.relayout(&mut nodes, &edges, prior)
        };

        Self {
            generation: 0,
            scope: FetchScope::default(),
            built_at: Utc::now(),
            nodes,
            edges,
            skipped: 0,
            fetch_errors: Vec::new(),
            layout,
        }
    }

    /// Normalize raw responses and build a snapshot from them
    pub fn from_raw(batches: &[(ResourceKind, Value)], engine: &LayoutEngine) -> Result<Self> {
        let reports: Vec<NormalizeReport> = batches
            .iter()
            .map(|(kind, raw)| normalize_with_report(raw, *kind))
            .collect();
        let skipped = reports.iter().map(|r| r.skipped).sum();
        let resources: Vec<NormalizedResource> = reports.into_iter().flat_map(|r| r.resources).collect();
        validate_resource_count(resources.len())?;

        let mut snapshot = Self::build(resources, engine, &HashMap::new());
        snapshot.skipped = skipped;
        Ok(snapshot)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn positions(&self) -> HashMap<String, Position> {
        self.nodes
            .iter()
            .map(|n| (n.id().to_string(), n.position()))
            .collect()
    }

    /// Resource count per kind
    pub fn kind_counts(&self) -> BTreeMap<ResourceKind, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.resource.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Holder of the visible graph
pub struct TopologyService {
    engine: LayoutEngine,
    generation: AtomicU64,
    current: RwLock<Option<Arc<GraphSnapshot>>>,
    changed: watch::Sender<u64>,
}

impl TopologyService {
    pub fn new(config: LayoutConfig) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            engine: LayoutEngine::new(config),
            generation: AtomicU64::new(0),
            current: RwLock::new(None),
            changed,
        }
    }

    pub fn layout_config(&self) -> &LayoutConfig {
        self.engine.config()
    }

    /// Latest committed snapshot
    pub fn current(&self) -> Option<Arc<GraphSnapshot>> {
        self.current.read().clone()
    }

    /// Receives the generation of every committed snapshot
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    /// Generation of the most recently started refresh
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Fetch, build and commit a new snapshot.
    ///
    /// Kinds that fail to fetch are recorded in `fetch_errors` and the rest of
    /// the graph is still built. Fails with [`Error::Source`] only when every
    /// kind failed, and with [`Error::Superseded`] when a newer refresh started
    /// before this one could commit.
    pub async fn refresh(&self, source: &dyn ResourceSource, scope: FetchScope) -> Result<Arc<GraphSnapshot>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let kinds = scope.effective_kinds();
        tracing::info!("Refreshing graph (generation {}, {} kinds)", generation, kinds.len());

        let fetches = kinds.iter().map(|kind| {
            let scope = &scope;
            async move { (*kind, source.fetch(*kind, scope).await) }
        });
        let results = futures::future::join_all(fetches).await;

        let mut batches = Vec::with_capacity(results.len());
        let mut fetch_errors = Vec::new();
        for (kind, result) in results {
            match result {
                Ok(raw) => batches.push((kind, raw)),
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {}", kind.plural(), e);
                    fetch_errors.push(FetchError {
                        kind,
                        message: e.to_string(),
                    });
                }
            }
        }

        if batches.is_empty() {
            if let Some(first) = fetch_errors.first() {
                return Err(Error::Source {
                    kind: first.kind.plural().to_string(),
                    message: first.message.clone(),
                });
            }
        }

        self.ensure_latest(generation)?;

        let prior = self
            .current()
            .filter(|snapshot| snapshot.scope.same_view(&scope))
            .map(|snapshot| snapshot.positions())
            .unwrap_or_default();
        let engine = self.engine.clone();

        let mut snapshot = tokio::task::spawn_blocking(move || -> Result<GraphSnapshot> {
            let reports: Vec<NormalizeReport> = batches
                .iter()
                .map(|(kind, raw)| normalize_with_report(raw, *kind))
                .collect();
            let skipped = reports.iter().map(|r| r.skipped).sum();
            let resources: Vec<NormalizedResource> = reports.into_iter().flat_map(|r| r.resources).collect();
            validate_resource_count(resources.len())?;

            let mut snapshot = GraphSnapshot::build(resources, &engine, &prior);
            snapshot.skipped = skipped;
            Ok(snapshot)
        })
        .await
        .map_err(|e| Error::Internal(format!("Layout task failed: {}", e)))??;

        snapshot.generation = generation;
        snapshot.scope = scope;
        snapshot.fetch_errors = fetch_errors;
        self.commit(snapshot)
    }

    /// Commit a snapshot built outside of [`refresh`](Self::refresh)
    pub fn publish(&self, mut snapshot: GraphSnapshot) -> Result<Arc<GraphSnapshot>> {
        snapshot.generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.commit(snapshot)
    }

    fn ensure_latest(&self, generation: u64) -> Result<()> {
        let latest = self.latest_generation();
        if latest != generation {
            tracing::debug!("Discarding refresh {} (latest is {})", generation, latest);
            return Err(Error::Superseded { generation });
        }
        Ok(())
    }

    fn commit(&self, snapshot: GraphSnapshot) -> Result<Arc<GraphSnapshot>> {
        let generation = snapshot.generation;
        let snapshot = Arc::new(snapshot);
        {
            let mut current = self.current.write();
            self.ensure_latest(generation)?;
            *current = Some(Arc::clone(&snapshot));
        }
        self.changed.send_replace(generation);
        tracing::info!(
            "Committed graph generation {} ({} nodes, {} edges)",
            generation,
            snapshot.nodes.len(),
            snapshot.edges.len()
        );
        Ok(snapshot)
    }
}

impl Default for TopologyService {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}
