//! Neighborhood exploration over a built graph

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::edge::{EdgeType, GraphEdge};
use crate::layout::GraphNode;
use crate::resource::ResourceKind;

/// Which edges to follow from a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Edges where the resource is the source
    Outgoing,
    /// Edges where the resource is the target
    Incoming,
    #[default]
    Both,
}

/// Neighborhood query builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborhoodQuery {
    /// Starting resource id
    pub start: String,

    #[serde(default = "default_depth")]
    pub max_depth: u32,

    #[serde(default)]
    pub direction: Direction,

    /// Only step onto these kinds (empty = all kinds)
    #[serde(default)]
    pub kind_filter: Vec<ResourceKind>,

    /// Only follow these edge types (empty = all types)
    #[serde(default)]
    pub edge_type_filter: Vec<EdgeType>,
}

fn default_depth() -> u32 {
    2
}

impl NeighborhoodQuery {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            max_depth: default_depth(),
            direction: Direction::Both,
            kind_filter: Vec::new(),
            edge_type_filter: Vec::new(),
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn filter_kinds(mut self, kinds: Vec<ResourceKind>) -> Self {
        self.kind_filter = kinds;
        self
    }

    pub fn filter_edge_types(mut self, types: Vec<EdgeType>) -> Self {
        self.edge_type_filter = types;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodStats {
    pub nodes_visited: usize,
    pub edges_traversed: usize,
    pub max_depth_reached: u32,
}

/// Resources reachable from the start, with the edges that reached them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodResult {
    pub start: String,
    /// Ordered by hop distance, then id
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub depths: HashMap<String, u32>,
    pub stats: NeighborhoodStats,
}

/// Breadth-first neighborhood search
pub struct Neighborhood;

impl Neighborhood {
    /// Explore outward from `query.start`. Returns `None` if the start is not in `nodes`.
    pub fn explore(query: &NeighborhoodQuery, nodes: &[GraphNode], edges: &[GraphEdge]) -> Option<NeighborhoodResult> {
        let by_id: HashMap<&str, &GraphNode> = nodes.iter().map(|n| (n.id(), n)).collect();
        by_id.get(query.start.as_str())?;

        tracing::debug!(
            "Exploring neighborhood: start={}, depth={}, direction={:?}",
            query.start,
            query.max_depth,
            query.direction
        );

        let mut depths: HashMap<String, u32> = HashMap::new();
        let mut kept_edges: Vec<GraphEdge> = Vec::new();
        let mut kept_ids: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, u32)> = VecDeque::new();
        let mut stats = NeighborhoodStats::default();

        depths.insert(query.start.clone(), 0);
        queue.push_back((query.start.as_str(), 0));

        while let Some((current, depth)) = queue.pop_front() {
            stats.nodes_visited += 1;
            stats.max_depth_reached = stats.max_depth_reached.max(depth);

            if depth >= query.max_depth {
                continue;
            }

            for edge in Self::incident(current, query.direction, edges) {
                if !query.edge_type_filter.is_empty() && !query.edge_type_filter.contains(&edge.edge_type) {
                    continue;
                }
                let next = if edge.source == current {
                    edge.target.as_str()
                } else {
                    edge.source.as_str()
                };
                let Some(node) = by_id.get(next) else {
                    continue;
                };
                if !query.kind_filter.is_empty() && !query.kind_filter.contains(&node.resource.kind) {
                    continue;
                }

                stats.edges_traversed += 1;
                if kept_ids.insert(edge.id.as_str()) {
                    kept_edges.push(edge.clone());
                }
                if !depths.contains_key(next) {
                    depths.insert(next.to_string(), depth + 1);
                    queue.push_back((next, depth + 1));
                }
            }
        }

        let mut found: Vec<GraphNode> = depths
            .keys()
            .filter_map(|id| by_id.get(id.as_str()).map(|n| (*n).clone()))
            .collect();
        found.sort_by(|a, b| depths[a.id()].cmp(&depths[b.id()]).then_with(|| a.id().cmp(b.id())));

        Some(NeighborhoodResult {
            start: query.start.clone(),
            nodes: found,
            edges: kept_edges,
            depths,
            stats,
        })
    }

    fn incident<'e>(id: &'e str, direction: Direction, edges: &'e [GraphEdge]) -> impl Iterator<Item = &'e GraphEdge> {
        edges.iter().filter(move |e| match direction {
            Direction::Outgoing => e.source == id,
            Direction::Incoming => e.target == id,
            Direction::Both => e.touches(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeRule;
    use crate::resource::NormalizedResource;

    fn graph() -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let nodes = vec![
            NormalizedResource::new(ResourceKind::Deployment, "api", "shop"),
            NormalizedResource::new(ResourceKind::ReplicaSet, "api-7c9", "shop"),
            NormalizedResource::new(ResourceKind::Pod, "api-7c9-x", "shop"),
            NormalizedResource::new(ResourceKind::Service, "api", "shop"),
            NormalizedResource::new(ResourceKind::Node, "worker-1", ""),
        ]
        .into_iter()
        .map(GraphNode::from)
        .collect();

        let edges = vec![
            GraphEdge::new(EdgeRule::OwnerReference, "Deployment/shop/api", "ReplicaSet/shop/api-7c9"),
            GraphEdge::new(EdgeRule::OwnerReference, "ReplicaSet/shop/api-7c9", "Pod/shop/api-7c9-x"),
            GraphEdge::new(EdgeRule::ServiceSelector, "Service/shop/api", "Pod/shop/api-7c9-x"),
            GraphEdge::new(EdgeRule::NodePlacement, "Node/cluster/worker-1", "Pod/shop/api-7c9-x"),
        ];
        (nodes, edges)
    }

    #[test]
    fn test_unknown_start() {
        let (nodes, edges) = graph();
        assert!(Neighborhood::explore(&NeighborhoodQuery::new("Pod/shop/missing"), &nodes, &edges).is_none());
    }

    #[test]
    fn test_depth_limits_reach() {
        let (nodes, edges) = graph();
        let query = NeighborhoodQuery::new("Deployment/shop/api").with_depth(1);
        let result = Neighborhood::explore(&query, &nodes, &edges).unwrap();

        assert_eq!(result.nodes.len(), 2);
        assert_eq!(result.nodes[0].id(), "Deployment/shop/api");
        assert_eq!(result.depths["ReplicaSet/shop/api-7c9"], 1);
        assert_eq!(result.edges.len(), 1);
    }

    #[test]
    fn test_both_directions_reach_everything() {
        let (nodes, edges) = graph();
        let query = NeighborhoodQuery::new("Pod/shop/api-7c9-x");
        let result = Neighborhood::explore(&query, &nodes, &edges).unwrap();

        assert_eq!(result.nodes.len(), 5);
        assert_eq!(result.depths["Deployment/shop/api"], 2);
        assert_eq!(result.stats.max_depth_reached, 2);
    }

    #[test]
    fn test_direction_and_filters() {
        let (nodes, edges) = graph();

        let incoming = NeighborhoodQuery::new("Pod/shop/api-7c9-x")
            .with_depth(1)
            .with_direction(Direction::Incoming)
            .filter_edge_types(vec![EdgeType::Network]);
        let result = Neighborhood::explore(&incoming, &nodes, &edges).unwrap();
        let ids: Vec<_> = result.nodes.iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["Pod/shop/api-7c9-x", "Service/shop/api"]);

        let outgoing = NeighborhoodQuery::new("Pod/shop/api-7c9-x").with_direction(Direction::Outgoing);
        let result = Neighborhood::explore(&outgoing, &nodes, &edges).unwrap();
        assert_eq!(result.nodes.len(), 1);

        let nodes_only = NeighborhoodQuery::new("Pod/shop/api-7c9-x").filter_kinds(vec![ResourceKind::Node]);
        let result = Neighborhood::explore(&nodes_only, &nodes, &edges).unwrap();
        assert_eq!(result.nodes.len(), 2);
    }
}
