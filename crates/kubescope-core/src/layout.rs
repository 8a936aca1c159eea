//! Force-directed layout engine
//!
//! Positions graph nodes by iterative physical simulation. Initial positions
//! come from a namespace ring heuristic (or from a prior layout), then a
//! fixed number of relaxation passes apply repulsion, spring attraction and
//! a centering pull on the x/z plane. The engine has no randomness: the same
//! nodes, edges and configuration always produce the same positions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use crate::edge::GraphEdge;
use crate::limits::{validate_iterations, ValidationError};
use crate::resource::{NormalizedResource, CLUSTER_SCOPE};

/// Maximum sub-ring radius for a single namespace group
const MAX_GROUP_RADIUS: f64 = 8.0;

/// A point in layout space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A normalized resource with simulation state attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(flatten)]
    pub resource: NormalizedResource,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
}

impl GraphNode {
    pub fn new(resource: NormalizedResource) -> Self {
        Self {
            resource,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
        }
    }

    pub fn id(&self) -> &str {
        &self.resource.id
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }

    fn place(&mut self, position: Position) {
        self.x = position.x;
        self.y = position.y;
        self.z = position.z;
        self.vx = 0.0;
        self.vy = 0.0;
        self.vz = 0.0;
    }

    fn group_key(&self) -> &str {
        if self.resource.namespace.is_empty() {
            CLUSTER_SCOPE
        } else {
            &self.resource.namespace
        }
    }
}

impl From<NormalizedResource> for GraphNode {
    fn from(resource: NormalizedResource) -> Self {
        Self::new(resource)
    }
}

/// Force constants and pass budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub iterations: usize,
    pub repulsion: f64,
    pub attraction: f64,
    pub ideal_distance: f64,
    pub center_pull: f64,
    /// Velocity retained per pass, in `(0, 1)`
    pub damping: f64,
    /// Radius of the ring that namespace groups are placed on
    pub namespace_radius: f64,
    /// Fixed y for ground-plane kinds
    pub ground_y: f64,
    /// Distance floor for repulsion
    pub min_distance: f64,
    /// Wall-clock budget for relaxation; exceeded passes are skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            repulsion: 50.0,
            attraction: 0.05,
            ideal_distance: 5.0,
            center_pull: 0.01,
            damping: 0.85,
            namespace_radius: 20.0,
            ground_y: -8.0,
            min_distance: 0.01,
            deadline_ms: None,
        }
    }
}

impl LayoutConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    /// Reject constants that make the simulation diverge or stall
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_iterations(self.iterations)?;

        let invalid = |field: &'static str, reason: &'static str| -> Result<(), ValidationError> {
            Err(ValidationError::InvalidLayout { field, reason })
        };
        let constants = [
            ("repulsion", self.repulsion),
            ("attraction", self.attraction),
            ("ideal_distance", self.ideal_distance),
            ("center_pull", self.center_pull),
            ("damping", self.damping),
            ("namespace_radius", self.namespace_radius),
            ("ground_y", self.ground_y),
            ("min_distance", self.min_distance),
        ];
        for (field, value) in constants {
            if !value.is_finite() {
                return invalid(field, "must be a finite number");
            }
        }
        for (field, value) in &constants[..4] {
            if *value < 0.0 {
                return invalid(*field, "must not be negative");
            }
        }
        if self.namespace_radius < 0.0 {
            return invalid("namespace_radius", "must not be negative");
        }
        if !(self.damping > 0.0 && self.damping < 1.0) {
            return invalid("damping", "must be between 0 and 1");
        }
        if self.min_distance <= 0.0 {
            return invalid("min_distance", "must be positive");
        }
        Ok(())
    }
}

/// What a layout pass actually did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutReport {
    pub iterations_run: usize,
    /// The deadline expired before the iteration budget was spent
    pub timed_out: bool,
}

/// Force-directed layout over an exclusively borrowed node set
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Lay out from scratch using the namespace ring heuristic
    pub fn layout(&self, nodes: &mut [GraphNode], edges: &[GraphEdge]) -> LayoutReport {
        self.initialize(nodes);
        self.settle(nodes, edges)
    }

    /// Re-settle, seeding nodes that have a prior position from `prior`.
    /// Nodes without one start from the ring heuristic.
    pub fn relayout(
        &self,
        nodes: &mut [GraphNode],
        edges: &[GraphEdge],
        prior: &HashMap<String, Position>,
    ) -> LayoutReport {
        self.initialize(nodes);
        for node in nodes.iter_mut() {
            if let Some(position) = prior.get(node.id()) {
                node.place(*position);
            }
        }
        self.settle(nodes, edges)
    }

    /// Namespace clustering: groups on an outer ring, members on a sub-ring
    pub fn initialize(&self, nodes: &mut [GraphNode]) {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, node) in nodes.iter().enumerate() {
            groups.entry(node.group_key().to_string()).or_default().push(index);
        }

        let group_count = groups.len();
        for (group_index, members) in groups.values_mut().enumerate() {
            members.sort_by(|a, b| nodes[*a].id().cmp(nodes[*b].id()));

            let (cx, cz) = if group_count > 1 {
                let angle = TAU * group_index as f64 / group_count as f64;
                (
                    self.config.namespace_radius * angle.cos(),
                    self.config.namespace_radius * angle.sin(),
                )
            } else {
                (0.0, 0.0)
            };

            let size = members.len();
            let radius = (1.5 * size as f64).min(MAX_GROUP_RADIUS);
            for (slot, &index) in members.iter().enumerate() {
                let angle = TAU * slot as f64 / size as f64;
                nodes[index].place(Position::new(cx + radius * angle.cos(), 0.0, cz + radius * angle.sin()));
            }
        }
    }

    /// Run relaxation passes from the current positions, then pin ground-plane kinds
    pub fn settle(&self, nodes: &mut [GraphNode], edges: &[GraphEdge]) -> LayoutReport {
        let report = self.relax(nodes, edges);
        for node in nodes.iter_mut() {
            if node.resource.kind.is_ground_plane() {
                node.y = self.config.ground_y;
                node.vy = 0.0;
            }
        }
        report
    }

    fn relax(&self, nodes: &mut [GraphNode], edges: &[GraphEdge]) -> LayoutReport {
        let cfg = &self.config;
        let count = nodes.len();
        let mut report = LayoutReport::default();
        if count == 0 || cfg.iterations == 0 {
            return report;
        }

        let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id(), i)).collect();
        let springs: Vec<(usize, usize)> = edges
            .iter()
            .filter_map(|e| Some((*index.get(e.source.as_str())?, *index.get(e.target.as_str())?)))
            .filter(|(s, t)| s != t)
            .collect();
        drop(index);

        let started = Instant::now();
        let deadline = cfg.deadline_ms.map(Duration::from_millis);
        let floor = cfg.min_distance.max(f64::EPSILON);
        let mut fx = vec![0.0; count];
        let mut fz = vec![0.0; count];

        for iteration in 0..cfg.iterations {
            if let Some(deadline) = deadline {
                if started.elapsed() >= deadline {
                    report.timed_out = true;
                    tracing::debug!(
                        "Layout deadline reached after {} of {} passes",
                        iteration,
                        cfg.iterations
                    );
                    break;
                }
            }

            let cooling = 1.0 - iteration as f64 / cfg.iterations as f64;
            fx.iter_mut().for_each(|f| *f = 0.0);
            fz.iter_mut().for_each(|f| *f = 0.0);

            for i in 0..count {
                for j in (i + 1)..count {
                    let (ux, uz, distance) = direction(&nodes[i], &nodes[j], i, j, floor);
                    let force = cfg.repulsion / (distance * distance) * cooling;
                    fx[i] += ux * force;
                    fz[i] += uz * force;
                    fx[j] -= ux * force;
                    fz[j] -= uz * force;
                }
            }

            for &(source, target) in &springs {
                let (ux, uz, distance) = direction(&nodes[target], &nodes[source], target, source, floor);
                let force = (distance - cfg.ideal_distance) * cfg.attraction * cooling;
                fx[source] += ux * force;
                fz[source] += uz * force;
                fx[target] -= ux * force;
                fz[target] -= uz * force;
            }

            for (i, node) in nodes.iter_mut().enumerate() {
                fx[i] -= cfg.center_pull * node.x * cooling;
                fz[i] -= cfg.center_pull * node.z * cooling;

                node.vx = (node.vx + fx[i]) * cfg.damping;
                node.vz = (node.vz + fz[i]) * cfg.damping;
                node.x += node.vx;
                node.z += node.vz;
            }

            report.iterations_run = iteration + 1;
        }

        report
    }
}

/// Unit vector from `b` to `a` on the x/z plane and the floored distance.
/// Coincident nodes get a fixed direction derived from their indices.
fn direction(a: &GraphNode, b: &GraphNode, ia: usize, ib: usize, floor: f64) -> (f64, f64, f64) {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    let distance = (dx * dx + dz * dz).sqrt();
    if distance < floor {
        let angle = TAU * ((ia * 7 + ib * 13) % 64) as f64 / 64.0;
        let sign = if ia < ib { 1.0 } else { -1.0 };
        return (sign * angle.cos(), sign * angle.sin(), floor);
    }
    (dx / distance, dz / distance, distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeRule;
    use crate::resource::ResourceKind;

    #[test]
    fn test_config_validation() {
        assert!(LayoutConfig::default().validate().is_ok());

        let diverging = LayoutConfig {
            damping: 1.0,
            ..LayoutConfig::default()
        };
        assert_eq!(
            diverging.validate(),
            Err(ValidationError::InvalidLayout {
                field: "damping",
                reason: "must be between 0 and 1"
            })
        );

        let no_floor = LayoutConfig {
            min_distance: -1.0,
            ..LayoutConfig::default()
        };
        assert!(no_floor.validate().is_err());

        let nan = LayoutConfig {
            repulsion: f64::NAN,
            ..LayoutConfig::default()
        };
        assert!(nan.validate().is_err());

        let negative = LayoutConfig {
            attraction: -0.5,
            ..LayoutConfig::default()
        };
        assert!(negative.validate().is_err());

        assert!(LayoutConfig::default().with_iterations(1_000_000).validate().is_err());
    }

    fn sample() -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let nodes: Vec<GraphNode> = vec![
            NormalizedResource::new(ResourceKind::Deployment, "api", "shop"),
            NormalizedResource::new(ResourceKind::Pod, "api-1", "shop"),
            NormalizedResource::new(ResourceKind::Pod, "api-2", "shop"),
            NormalizedResource::new(ResourceKind::Service, "api", "shop"),
            NormalizedResource::new(ResourceKind::Pod, "db-0", "data"),
            NormalizedResource::new(ResourceKind::Node, "worker-1", ""),
        ]
        .into_iter()
        .map(GraphNode::from)
        .collect();

        let edges = vec![
            GraphEdge::new(EdgeRule::OwnerReference, "Deployment/shop/api", "Pod/shop/api-1"),
            GraphEdge::new(EdgeRule::OwnerReference, "Deployment/shop/api", "Pod/shop/api-2"),
            GraphEdge::new(EdgeRule::ServiceSelector, "Service/shop/api", "Pod/shop/api-1"),
            GraphEdge::new(EdgeRule::NodePlacement, "Node/cluster/worker-1", "Pod/shop/api-1"),
            GraphEdge::new(EdgeRule::NodePlacement, "Node/cluster/worker-1", "Pod/data/db-0"),
            GraphEdge::new(EdgeRule::OwnerReference, "Deployment/shop/api", "Pod/shop/missing"),
        ];
        (nodes, edges)
    }

    #[test]
    fn test_layout_is_deterministic() {
        let engine = LayoutEngine::default();

        let (mut first, edges) = sample();
        let (mut second, _) = sample();
        engine.layout(&mut first, &edges);
        engine.layout(&mut second, &edges);

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.x.to_bits(), b.x.to_bits());
            assert_eq!(a.y.to_bits(), b.y.to_bits());
            assert_eq!(a.z.to_bits(), b.z.to_bits());
        }
    }

    #[test]
    fn test_layout_ignores_input_order() {
        let engine = LayoutEngine::default();
        let (mut forward, _) = sample();
        let (mut reversed, _) = sample();
        reversed.reverse();

        engine.initialize(&mut forward);
        engine.initialize(&mut reversed);
        for node in &forward {
            let other = reversed.iter().find(|n| n.id() == node.id()).unwrap();
            assert_eq!(node.position(), other.position());
        }
    }

    #[test]
    fn test_ground_plane_kinds_are_pinned() {
        let engine = LayoutEngine::default();
        let (mut nodes, edges) = sample();
        engine.layout(&mut nodes, &edges);

        for node in &nodes {
            if node.resource.kind == ResourceKind::Node {
                assert_eq!(node.y, engine.config().ground_y);
            } else {
                assert_eq!(node.y, 0.0);
            }
            assert!(node.x.is_finite() && node.z.is_finite());
        }
    }

    #[test]
    fn test_single_namespace_centers_at_origin() {
        let engine = LayoutEngine::default();
        let mut nodes: Vec<GraphNode> = (0..4)
            .map(|i| GraphNode::from(NormalizedResource::new(ResourceKind::Pod, format!("p{}", i), "only")))
            .collect();
        engine.initialize(&mut nodes);

        let radius = 1.5 * 4.0;
        for node in &nodes {
            let r = (node.x * node.x + node.z * node.z).sqrt();
            assert!((r - radius).abs() < 1e-9);
            assert_eq!(node.vx, 0.0);
        }
    }

    #[test]
    fn test_group_radius_is_capped() {
        let engine = LayoutEngine::default();
        let mut nodes: Vec<GraphNode> = (0..20)
            .map(|i| GraphNode::from(NormalizedResource::new(ResourceKind::Pod, format!("p{:02}", i), "big")))
            .collect();
        engine.initialize(&mut nodes);
        for node in &nodes {
            let r = (node.x * node.x + node.z * node.z).sqrt();
            assert!((r - MAX_GROUP_RADIUS).abs() < 1e-9);
        }
    }

    #[test]
    fn test_coincident_nodes_separate() {
        let engine = LayoutEngine::new(LayoutConfig::default().with_iterations(20));
        let mut nodes: Vec<GraphNode> = (0..3)
            .map(|i| GraphNode::from(NormalizedResource::new(ResourceKind::Pod, format!("p{}", i), "x")))
            .collect();
        let prior: HashMap<String, Position> = nodes.iter().map(|n| (n.id().to_string(), Position::default())).collect();

        engine.relayout(&mut nodes, &[], &prior);
        assert!(nodes.iter().all(|n| n.x.is_finite() && n.z.is_finite()));
        assert_ne!(nodes[0].position(), nodes[1].position());
    }

    #[test]
    fn test_relayout_seeds_prior_positions() {
        let engine = LayoutEngine::new(LayoutConfig::default().with_iterations(0));
        let (mut nodes, edges) = sample();
        let mut prior = HashMap::new();
        prior.insert("Pod/shop/api-1".to_string(), Position::new(3.0, 0.0, -4.0));

        let report = engine.relayout(&mut nodes, &edges, &prior);
        assert_eq!(report.iterations_run, 0);
        let seeded = nodes.iter().find(|n| n.id() == "Pod/shop/api-1").unwrap();
        assert_eq!(seeded.position(), Position::new(3.0, 0.0, -4.0));
    }

    #[test]
    fn test_expired_deadline_returns_best_effort() {
        let engine = LayoutEngine::new(LayoutConfig::default().with_deadline(Duration::ZERO));
        let (mut nodes, edges) = sample();
        let report = engine.layout(&mut nodes, &edges);

        assert!(report.timed_out);
        assert_eq!(report.iterations_run, 0);
        let node = nodes.iter().find(|n| n.resource.kind == ResourceKind::Node).unwrap();
        assert_eq!(node.y, engine.config().ground_y);
    }

    #[test]
    fn test_full_budget_reports_iterations() {
        let engine = LayoutEngine::new(LayoutConfig::default().with_iterations(25));
        let (mut nodes, edges) = sample();
        let report = engine.layout(&mut nodes, &edges);
        assert_eq!(report.iterations_run, 25);
        assert!(!report.timed_out);
    }

    #[test]
    fn test_empty_graph() {
        let engine = LayoutEngine::default();
        let report = engine.layout(&mut [], &[]);
        assert_eq!(report, LayoutReport::default());
    }
}
