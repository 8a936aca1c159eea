//! Relationship builder
//!
//! Infers typed edges between normalized resources. Each rule runs
//! independently, so edges produced by different rules may connect the same
//! pair. An edge whose endpoints are not both present is never emitted.

use std::collections::{BTreeMap, HashSet};

use crate::edge::{EdgeRule, GraphEdge};
use crate::resource::{resource_id, NormalizedResource, ReferenceSource, ResourceKind, CLUSTER_SCOPE};

/// Builds the edge set for a resource map keyed by resource id
pub struct RelationshipBuilder<'a> {
    resources: &'a BTreeMap<String, NormalizedResource>,
    edges: Vec<GraphEdge>,
    seen: HashSet<String>,
}

fn of_kind(
    resources: &BTreeMap<String, NormalizedResource>,
    kind: ResourceKind,
) -> impl Iterator<Item = &NormalizedResource> {
    resources.values().filter(move |r| r.kind == kind)
}

impl<'a> RelationshipBuilder<'a> {
    pub fn new(resources: &'a BTreeMap<String, NormalizedResource>) -> Self {
        Self {
            resources,
            edges: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Run every rule and return the edges in rule order
    pub fn build_edges(resources: &'a BTreeMap<String, NormalizedResource>) -> Vec<GraphEdge> {
        Self::new(resources).build()
    }

    pub fn build(mut self) -> Vec<GraphEdge> {
        self.owner_references();
        self.service_selectors();
        self.ingress_backends();
        self.volume_bindings();
        self.node_placements();
        self.config_references();
        self.scale_targets();

        tracing::debug!(
            "Built {} edges over {} resources",
            self.edges.len(),
            self.resources.len()
        );
        self.edges
    }

    /// Keep the first edge per id; drop edges with a missing endpoint
    fn emit(&mut self, edge: GraphEdge) {
        if !self.resources.contains_key(&edge.source) || !self.resources.contains_key(&edge.target) {
            return;
        }
        if self.seen.insert(edge.id.clone()) {
            self.edges.push(edge);
        }
    }

    // Owner references never cross namespaces
    fn owner_references(&mut self) {
        let resources = self.resources;
        for dependent in resources.values() {
            for owner in &dependent.owner_references {
                let owner_id = format!("{}/{}/{}", owner.kind, dependent.namespace, owner.name);
                self.emit(GraphEdge::new(EdgeRule::OwnerReference, owner_id, &dependent.id).with_label("owns"));
            }
        }
    }

    fn service_selectors(&mut self) {
        let resources = self.resources;
        let services: Vec<_> = of_kind(resources, ResourceKind::Service)
            .filter(|s| !s.selector.is_empty())
            .collect();
        let pods: Vec<_> = of_kind(resources, ResourceKind::Pod).collect();

        for service in services {
            let label = service
                .ports
                .first()
                .and_then(|p| p.mapping_label())
                .unwrap_or_else(|| "selects".to_string());

            for pod in pods.iter().filter(|p| p.namespace == service.namespace) {
                if NormalizedResource::selector_matches(&service.selector, &pod.labels) {
                    self.emit(GraphEdge::new(EdgeRule::ServiceSelector, &service.id, &pod.id).with_label(label.clone()));
                }
            }
        }
    }

    fn ingress_backends(&mut self) {
        let resources = self.resources;
        for ingress in of_kind(resources, ResourceKind::Ingress) {
            for path in ingress.rules.iter().flat_map(|r| &r.paths) {
                let Some(service_name) = &path.service_name else {
                    continue;
                };
                let service_id = resource_id(ResourceKind::Service, &ingress.namespace, service_name);
                let label = if path.path.is_empty() { "/" } else { path.path.as_str() };
                self.emit(GraphEdge::new(EdgeRule::IngressBackend, &ingress.id, service_id).with_label(label));
            }
        }
    }

    fn volume_bindings(&mut self) {
        let resources = self.resources;
        for claim in of_kind(resources, ResourceKind::PersistentVolumeClaim) {
            if let Some(volume) = &claim.volume_name {
                let volume_id = resource_id(ResourceKind::PersistentVolume, CLUSTER_SCOPE, volume);
                self.emit(GraphEdge::new(EdgeRule::VolumeBinding, &claim.id, volume_id).with_label("bound"));
            }
        }
    }

    fn node_placements(&mut self) {
        let resources = self.resources;
        for pod in of_kind(resources, ResourceKind::Pod) {
            if let Some(node) = &pod.node_name {
                let node_id = resource_id(ResourceKind::Node, CLUSTER_SCOPE, node);
                self.emit(GraphEdge::new(EdgeRule::NodePlacement, node_id, &pod.id).with_label("runs"));
            }
        }
    }

    fn config_references(&mut self) {
        let resources = self.resources;
        for pod in of_kind(resources, ResourceKind::Pod) {
            for reference in &pod.references {
                let target = resource_id(reference.kind, &pod.namespace, &reference.name);
                let edge = match (reference.kind, reference.source) {
                    (ResourceKind::PersistentVolumeClaim, _) => {
                        GraphEdge::new(EdgeRule::ClaimMount, &pod.id, target).with_label("mounts")
                    }
                    (_, ReferenceSource::Volume) => {
                        GraphEdge::new(EdgeRule::ConfigReference, &pod.id, target).with_label("mounts")
                    }
                    (_, ReferenceSource::EnvFrom) => {
                        GraphEdge::new(EdgeRule::ConfigReference, &pod.id, target).with_label("env")
                    }
                };
                self.emit(edge);
            }
        }
    }

    fn scale_targets(&mut self) {
        let resources = self.resources;
        for hpa in of_kind(resources, ResourceKind::HorizontalPodAutoscaler) {
            if let Some(target) = &hpa.scale_target {
                let target_id = format!("{}/{}/{}", target.kind, hpa.namespace, target.name);
                self.emit(GraphEdge::new(EdgeRule::ScaleTarget, &hpa.id, target_id).with_label("scales"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeType;
    use crate::resource::{IngressPath, IngressRule, ScaleTargetRef, TargetPort};

    fn index(resources: Vec<NormalizedResource>) -> BTreeMap<String, NormalizedResource> {
        resources.into_iter().map(|r| (r.id.clone(), r)).collect()
    }

    #[test]
    fn test_ownership_scenario() {
        let resources = index(vec![
            NormalizedResource::new(ResourceKind::Deployment, "nginx", "default"),
            NormalizedResource::new(ResourceKind::Pod, "nginx-abc", "default").with_owner("Deployment", "nginx"),
        ]);

        let edges = RelationshipBuilder::build_edges(&resources);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "Deployment/default/nginx");
        assert_eq!(edges[0].target, "Pod/default/nginx-abc");
        assert_eq!(edges[0].edge_type, EdgeType::Ownership);
        assert_eq!(edges[0].label.as_deref(), Some("owns"));
    }

    #[test]
    fn test_owner_references_stay_in_namespace() {
        let resources = index(vec![
            NormalizedResource::new(ResourceKind::Deployment, "nginx", "other"),
            NormalizedResource::new(ResourceKind::Pod, "nginx-abc", "default").with_owner("Deployment", "nginx"),
        ]);
        assert!(RelationshipBuilder::build_edges(&resources).is_empty());
    }

    #[test]
    fn test_service_routing_scenario() {
        let resources = index(vec![
            NormalizedResource::new(ResourceKind::Service, "svc", "default")
                .with_selector("app", "nginx")
                .with_port(80, Some(TargetPort::Number(8080))),
            NormalizedResource::new(ResourceKind::Pod, "p1", "default").with_label("app", "nginx"),
            NormalizedResource::new(ResourceKind::Pod, "p2", "elsewhere").with_label("app", "nginx"),
        ]);

        let edges = RelationshipBuilder::build_edges(&resources);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "Service/default/svc");
        assert_eq!(edges[0].target, "Pod/default/p1");
        assert_eq!(edges[0].edge_type, EdgeType::Network);
        assert_eq!(edges[0].label.as_deref(), Some("80→8080"));
    }

    #[test]
    fn test_selector_conjunction() {
        let resources = index(vec![
            NormalizedResource::new(ResourceKind::Service, "web", "default")
                .with_selector("app", "x")
                .with_selector("tier", "web"),
            NormalizedResource::new(ResourceKind::Pod, "partial", "default").with_label("app", "x"),
            NormalizedResource::new(ResourceKind::Pod, "full", "default")
                .with_label("app", "x")
                .with_label("tier", "web")
                .with_label("extra", "z"),
        ]);

        let edges = RelationshipBuilder::build_edges(&resources);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, "Pod/default/full");
        assert_eq!(edges[0].label.as_deref(), Some("selects"));
    }

    #[test]
    fn test_empty_selector_selects_nothing() {
        let resources = index(vec![
            NormalizedResource::new(ResourceKind::Service, "headless", "default"),
            NormalizedResource::new(ResourceKind::Pod, "p", "default").with_label("app", "x"),
        ]);
        assert!(RelationshipBuilder::build_edges(&resources).is_empty());
    }

    #[test]
    fn test_ingress_storage_and_node_edges() {
        let mut ingress = NormalizedResource::new(ResourceKind::Ingress, "edge", "shop");
        ingress.rules.push(IngressRule {
            host: None,
            paths: vec![
                IngressPath {
                    path: "/api".to_string(),
                    service_name: Some("api".to_string()),
                    service_port: None,
                },
                IngressPath {
                    path: String::new(),
                    service_name: Some("web".to_string()),
                    service_port: None,
                },
            ],
        });

        let resources = index(vec![
            ingress,
            NormalizedResource::new(ResourceKind::Service, "api", "shop"),
            NormalizedResource::new(ResourceKind::Service, "web", "shop"),
            NormalizedResource::new(ResourceKind::PersistentVolumeClaim, "data", "shop").with_volume_name("pv-1"),
            NormalizedResource::new(ResourceKind::PersistentVolume, "pv-1", ""),
            NormalizedResource::new(ResourceKind::Node, "worker-1", ""),
            NormalizedResource::new(ResourceKind::Pod, "api-1", "shop").with_node("worker-1"),
        ]);

        let edges = RelationshipBuilder::build_edges(&resources);
        let labels: Vec<_> = edges.iter().filter_map(|e| e.label.as_deref()).collect();
        assert!(labels.contains(&"/api"));
        assert!(labels.contains(&"/"));
        assert!(labels.contains(&"bound"));

        let runs = edges.iter().find(|e| e.rule == EdgeRule::NodePlacement).unwrap();
        assert_eq!(runs.source, "Node/cluster/worker-1");
        assert_eq!(runs.edge_type, EdgeType::Ownership);
        assert_eq!(runs.label.as_deref(), Some("runs"));
    }

    #[test]
    fn test_config_and_scale_edges() {
        let mut hpa = NormalizedResource::new(ResourceKind::HorizontalPodAutoscaler, "api", "shop");
        hpa.scale_target = Some(ScaleTargetRef {
            kind: "Deployment".to_string(),
            name: "api".to_string(),
        });

        let resources = index(vec![
            hpa,
            NormalizedResource::new(ResourceKind::Deployment, "api", "shop"),
            NormalizedResource::new(ResourceKind::ConfigMap, "cfg", "shop"),
            NormalizedResource::new(ResourceKind::Secret, "creds", "shop"),
            NormalizedResource::new(ResourceKind::PersistentVolumeClaim, "data", "shop"),
            NormalizedResource::new(ResourceKind::Pod, "api-1", "shop")
                .with_reference(ResourceKind::ConfigMap, "cfg", ReferenceSource::Volume)
                .with_reference(ResourceKind::Secret, "creds", ReferenceSource::EnvFrom)
                .with_reference(ResourceKind::PersistentVolumeClaim, "data", ReferenceSource::Volume)
                .with_reference(ResourceKind::ConfigMap, "missing", ReferenceSource::Volume),
        ]);

        let edges = RelationshipBuilder::build_edges(&resources);
        assert_eq!(edges.len(), 4);
        let by_rule = |rule| edges.iter().filter(move |e: &&GraphEdge| e.rule == rule).count();
        assert_eq!(by_rule(EdgeRule::ConfigReference), 2);
        assert_eq!(by_rule(EdgeRule::ClaimMount), 1);
        assert_eq!(by_rule(EdgeRule::ScaleTarget), 1);
        assert!(edges
            .iter()
            .any(|e| e.target == "Secret/shop/creds" && e.label.as_deref() == Some("env")));
    }

    #[test]
    fn test_dangling_endpoints_are_dropped() {
        let resources = index(vec![
            NormalizedResource::new(ResourceKind::Pod, "orphan", "default")
                .with_owner("ReplicaSet", "gone")
                .with_node("missing-node"),
            NormalizedResource::new(ResourceKind::PersistentVolumeClaim, "data", "default").with_volume_name("nope"),
        ]);

        let edges = RelationshipBuilder::build_edges(&resources);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_mixed_graph_edges_only_join_known_resources() {
        let mut ingress = NormalizedResource::new(ResourceKind::Ingress, "edge", "shop");
        ingress.rules.push(IngressRule {
            host: Some("shop.example.com".to_string()),
            paths: vec![IngressPath {
                path: "/".to_string(),
                service_name: Some("retired".to_string()),
                service_port: None,
            }],
        });
        let mut hpa = NormalizedResource::new(ResourceKind::HorizontalPodAutoscaler, "web", "shop");
        hpa.scale_target = Some(ScaleTargetRef {
            kind: "Deployment".to_string(),
            name: "ghost".to_string(),
        });

        let resources = index(vec![
            ingress,
            hpa,
            NormalizedResource::new(ResourceKind::Deployment, "web", "shop"),
            NormalizedResource::new(ResourceKind::ReplicaSet, "web-rs", "shop").with_owner("Deployment", "web"),
            NormalizedResource::new(ResourceKind::ReplicaSet, "old-rs", "shop").with_owner("Deployment", "gone"),
            NormalizedResource::new(ResourceKind::Service, "web", "shop").with_selector("app", "web"),
            NormalizedResource::new(ResourceKind::Node, "worker-1", ""),
            NormalizedResource::new(ResourceKind::ConfigMap, "cfg", "shop"),
            NormalizedResource::new(ResourceKind::PersistentVolumeClaim, "data", "shop").with_volume_name("pv-gone"),
            NormalizedResource::new(ResourceKind::Pod, "web-1", "shop")
                .with_label("app", "web")
                .with_owner("ReplicaSet", "web-rs")
                .with_node("worker-1")
                .with_reference(ResourceKind::ConfigMap, "cfg", ReferenceSource::Volume)
                .with_reference(ResourceKind::Secret, "missing", ReferenceSource::EnvFrom)
                .with_reference(ResourceKind::PersistentVolumeClaim, "lost", ReferenceSource::Volume),
            NormalizedResource::new(ResourceKind::Pod, "stray", "shop")
                .with_owner("ReplicaSet", "ghost")
                .with_node("ghost-node"),
        ]);

        let edges = RelationshipBuilder::build_edges(&resources);
        assert_eq!(edges.len(), 5);
        for edge in &edges {
            assert!(resources.contains_key(&edge.source), "dangling source {}", edge.source);
            assert!(resources.contains_key(&edge.target), "dangling target {}", edge.target);
        }
    }

    #[test]
    fn test_repeated_builds_are_identical() {
        let resources = index(vec![
            NormalizedResource::new(ResourceKind::Service, "svc", "default").with_selector("app", "a"),
            NormalizedResource::new(ResourceKind::Pod, "p", "default")
                .with_label("app", "a")
                .with_owner("ReplicaSet", "rs")
                .with_owner("ReplicaSet", "rs"),
            NormalizedResource::new(ResourceKind::ReplicaSet, "rs", "default"),
        ]);

        let first = RelationshipBuilder::build_edges(&resources);
        let second = RelationshipBuilder::build_edges(&resources);
        assert_eq!(first, second);

        let ids: HashSet<_> = first.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), first.len());
        assert_eq!(first.len(), 2);
    }
}
