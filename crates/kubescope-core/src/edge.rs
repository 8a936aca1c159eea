//! Graph edge types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse edge category used for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Ownership,
    Network,
    Storage,
    Config,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ownership => "ownership",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The inference rule that produced an edge.
///
/// Node placement edges share the `ownership` type with owner references;
/// the rule keeps them distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeRule {
    OwnerReference,
    ServiceSelector,
    IngressBackend,
    VolumeBinding,
    NodePlacement,
    ConfigReference,
    ClaimMount,
    ScaleTarget,
}

impl EdgeRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OwnerReference => "owner-reference",
            Self::ServiceSelector => "service-selector",
            Self::IngressBackend => "ingress-backend",
            Self::VolumeBinding => "volume-binding",
            Self::NodePlacement => "node-placement",
            Self::ConfigReference => "config-reference",
            Self::ClaimMount => "claim-mount",
            Self::ScaleTarget => "scale-target",
        }
    }

    /// Edge type emitted by this rule
    pub fn edge_type(&self) -> EdgeType {
        match self {
            Self::OwnerReference | Self::NodePlacement => EdgeType::Ownership,
            Self::ServiceSelector | Self::IngressBackend => EdgeType::Network,
            Self::VolumeBinding | Self::ClaimMount => EdgeType::Storage,
            Self::ConfigReference | Self::ScaleTarget => EdgeType::Config,
        }
    }
}

impl fmt::Display for EdgeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed relationship between two resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub rule: EdgeRule,
}

impl GraphEdge {
    /// Create an edge. The id is derived from rule and endpoints.
    pub fn new(rule: EdgeRule, source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}:{}->{}", rule, source, target),
            source,
            target,
            edge_type: rule.edge_type(),
            label: None,
            rule,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// True if `id` is either endpoint
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}
