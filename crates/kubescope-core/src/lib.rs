//! Kubescope Core - cluster topology engine
//!
//! This crate turns flat Kubernetes API query results into a typed
//! relationship graph and lays it out spatially for visualization.

pub mod edge;
pub mod error;
pub mod layout;
pub mod limits;
pub mod neighborhood;
pub mod normalize;
pub mod relationship;
pub mod resource;
pub mod topology;

pub use edge::{EdgeRule, EdgeType, GraphEdge};
pub use error::{Error, Result};
pub use layout::{GraphNode, LayoutConfig, LayoutEngine, LayoutReport, Position};
pub use neighborhood::{Direction, Neighborhood, NeighborhoodQuery, NeighborhoodResult, NeighborhoodStats};
pub use normalize::{normalize, normalize_with_report, NormalizeReport};
pub use relationship::RelationshipBuilder;
pub use resource::{resource_id, NormalizedResource, ResourceKind, CLUSTER_SCOPE};
pub use topology::{FetchError, FetchScope, GraphSnapshot, ResourceSource, TopologyService, DEFAULT_KINDS};
