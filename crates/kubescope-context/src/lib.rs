//! Kubescope Context - cluster context registry
//!
//! Tracks the contexts available from the cluster configuration, the active
//! context/namespace pair, and the namespace last used with each context.

pub mod error;
pub mod kubeconfig;
pub mod memory;
pub mod registry;
pub mod source;

pub use error::{ContextError, ContextResult};
pub use kubeconfig::KubeconfigSource;
pub use memory::StaticSource;
pub use registry::{ActiveSession, ContextDescriptor, ContextRegistry, ReloadSummary};
pub use source::{ClusterConfig, ContextEntry, ContextSource, DEFAULT_NAMESPACE};
