//! Normalized resource (node) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Namespace sentinel used for cluster-scoped kinds and records without a namespace
pub const CLUSTER_SCOPE: &str = "cluster";

/// Kubernetes resource kinds understood by the topology engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Pod,
    Deployment,
    Service,
    Ingress,
    ConfigMap,
    Secret,
    PersistentVolumeClaim,
    PersistentVolume,
    Node,
    Namespace,
    HorizontalPodAutoscaler,
    NetworkPolicy,
    Job,
    CronJob,
    ReplicaSet,
    StatefulSet,
    DaemonSet,
}

/// Static per-kind behavior. Indexed by the enum discriminant.
struct KindInfo {
    kind: ResourceKind,
    name: &'static str,
    plural: &'static str,
    camel_plural: &'static str,
    short: Option<&'static str>,
    cluster_scoped: bool,
    ground_plane: bool,
}

const KIND_TABLE: &[KindInfo] = &[
    KindInfo { kind: ResourceKind::Pod, name: "Pod", plural: "pods", camel_plural: "pods", short: Some("po"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::Deployment, name: "Deployment", plural: "deployments", camel_plural: "deployments", short: Some("deploy"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::Service, name: "Service", plural: "services", camel_plural: "services", short: Some("svc"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::Ingress, name: "Ingress", plural: "ingresses", camel_plural: "ingresses", short: Some("ing"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::ConfigMap, name: "ConfigMap", plural: "configmaps", camel_plural: "configMaps", short: Some("cm"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::Secret, name: "Secret", plural: "secrets", camel_plural: "secrets", short: None, cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::PersistentVolumeClaim, name: "PersistentVolumeClaim", plural: "persistentvolumeclaims", camel_plural: "persistentVolumeClaims", short: Some("pvc"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::PersistentVolume, name: "PersistentVolume", plural: "persistentvolumes", camel_plural: "persistentVolumes", short: Some("pv"), cluster_scoped: true, ground_plane: false },
    KindInfo { kind: ResourceKind::Node, name: "Node", plural: "nodes", camel_plural: "nodes", short: Some("no"), cluster_scoped: true, ground_plane: true },
    KindInfo { kind: ResourceKind::Namespace, name: "Namespace", plural: "namespaces", camel_plural: "namespaces", short: Some("ns"), cluster_scoped: true, ground_plane: false },
    KindInfo { kind: ResourceKind::HorizontalPodAutoscaler, name: "HorizontalPodAutoscaler", plural: "horizontalpodautoscalers", camel_plural: "horizontalPodAutoscalers", short: Some("hpa"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::NetworkPolicy, name: "NetworkPolicy", plural: "networkpolicies", camel_plural: "networkPolicies", short: Some("netpol"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::Job, name: "Job", plural: "jobs", camel_plural: "jobs", short: None, cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::CronJob, name: "CronJob", plural: "cronjobs", camel_plural: "cronJobs", short: Some("cj"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::ReplicaSet, name: "ReplicaSet", plural: "replicasets", camel_plural: "replicaSets", short: Some("rs"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::StatefulSet, name: "StatefulSet", plural: "statefulsets", camel_plural: "statefulSets", short: Some("sts"), cluster_scoped: false, ground_plane: false },
    KindInfo { kind: ResourceKind::DaemonSet, name: "DaemonSet", plural: "daemonsets", camel_plural: "daemonSets", short: Some("ds"), cluster_scoped: false, ground_plane: false },
];

impl ResourceKind {
    /// Every kind, in table order
    pub const ALL: [ResourceKind; 17] = [
        ResourceKind::Pod,
        ResourceKind::Deployment,
        ResourceKind::Service,
        ResourceKind::Ingress,
        ResourceKind::ConfigMap,
        ResourceKind::Secret,
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::PersistentVolume,
        ResourceKind::Node,
        ResourceKind::Namespace,
        ResourceKind::HorizontalPodAutoscaler,
        ResourceKind::NetworkPolicy,
        ResourceKind::Job,
        ResourceKind::CronJob,
        ResourceKind::ReplicaSet,
        ResourceKind::StatefulSet,
        ResourceKind::DaemonSet,
    ];

    fn info(self) -> &'static KindInfo {
        &KIND_TABLE[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.info().name
    }

    /// Lowercase plural, as used by `kubectl get <plural>`
    pub fn plural(self) -> &'static str {
        self.info().plural
    }

    /// Keys under which a raw response may carry a list of this kind
    pub fn collection_keys(self) -> [&'static str; 2] {
        let info = self.info();
        [info.plural, info.camel_plural]
    }

    pub fn is_cluster_scoped(self) -> bool {
        self.info().cluster_scoped
    }

    /// Ground-plane kinds are pinned below the graph during layout
    pub fn is_ground_plane(self) -> bool {
        self.info().ground_plane
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        KIND_TABLE
            .iter()
            .find(|info| {
                info.name.eq_ignore_ascii_case(&needle)
                    || info.plural == needle
                    || info.short == Some(needle.as_str())
            })
            .map(|info| info.kind)
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// Deterministic resource id from `(kind, namespace-or-"cluster", name)`
pub fn resource_id(kind: ResourceKind, namespace: &str, name: &str) -> String {
    format!("{}/{}/{}", kind, namespace, name)
}

/// Owner reference carried in `metadata.ownerReferences`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// Service target port, numeric or named
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetPort {
    Number(i64),
    Name(String),
}

impl fmt::Display for TargetPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Name(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<TargetPort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

impl ServicePort {
    /// `"<port>→<targetPort>"`, where an absent target port means the service port
    pub fn mapping_label(&self) -> Option<String> {
        let port = self.port?;
        let target = self
            .target_port
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| port.to_string());
        Some(format!("{}→{}", port, target))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    pub name: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub restart_count: i64,
    /// `running`, `waiting` or `terminated`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressPath {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default)]
    pub paths: Vec<IngressPath>,
}

/// How a pod pulls in a config or storage object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceSource {
    Volume,
    EnvFrom,
}

/// ConfigMap, Secret or PVC referenced from a pod spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodReference {
    pub kind: ResourceKind,
    pub name: String,
    pub source: ReferenceSource,
}

/// `spec.scaleTargetRef` of an autoscaler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTargetRef {
    pub kind: String,
    pub name: String,
}

/// A uniform, kind-tagged record derived from a raw cluster API object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResource {
    pub id: String,
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,

    #[serde(default, rename = "clusterIP", skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_statuses: Vec<ContainerStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IngressRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_utilization: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_utilization: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<PodReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_target: Option<ScaleTargetRef>,
}

impl NormalizedResource {
    /// Create a bare resource. Cluster-scoped kinds always land in the cluster scope.
    pub fn new(kind: ResourceKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let name = name.into();
        let namespace = if kind.is_cluster_scoped() {
            CLUSTER_SCOPE.to_string()
        } else {
            namespace.into()
        };
        Self {
            id: resource_id(kind, &namespace, &name),
            kind,
            name,
            namespace,
            status: "Unknown".to_string(),
            creation_timestamp: None,
            labels: BTreeMap::new(),
            owner_references: Vec::new(),
            node_name: None,
            replicas: None,
            ready_replicas: None,
            selector: BTreeMap::new(),
            ports: Vec::new(),
            cluster_ip: None,
            service_type: None,
            container_statuses: Vec::new(),
            rules: Vec::new(),
            volume_name: None,
            current_utilization: None,
            target_utilization: None,
            references: Vec::new(),
            scale_target: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.selector.insert(key.into(), value.into());
        self
    }

    pub fn with_owner(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.owner_references.push(OwnerReference {
            kind: kind.into(),
            name: name.into(),
            uid: None,
        });
        self
    }

    pub fn with_node(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    pub fn with_port(mut self, port: i64, target_port: Option<TargetPort>) -> Self {
        self.ports.push(ServicePort {
            name: None,
            port: Some(port),
            target_port,
            protocol: Some("TCP".to_string()),
        });
        self
    }

    pub fn with_volume_name(mut self, volume_name: impl Into<String>) -> Self {
        self.volume_name = Some(volume_name.into());
        self
    }

    pub fn with_reference(mut self, kind: ResourceKind, name: impl Into<String>, source: ReferenceSource) -> Self {
        self.references.push(PodReference {
            kind,
            name: name.into(),
            source,
        });
        self
    }

    /// True when every selector pair is present and equal in `labels`
    pub fn selector_matches(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}
