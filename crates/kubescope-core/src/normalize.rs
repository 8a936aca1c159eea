//! Resource normalizer
//!
//! Converts raw API query results into [`NormalizedResource`] records. Raw
//! items are inconsistent about where a field lives: the canonical location is
//! under `metadata`, `spec` or `status`, but some producers emit records that
//! are already flattened. Every logical field is therefore described by an
//! ordered list of accessor paths, evaluated first to last.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::resource::{
    resource_id, ContainerStatus, IngressPath, IngressRule, NormalizedResource, OwnerReference, PodReference,
    ReferenceSource, ResourceKind, ScaleTargetRef, ServicePort, TargetPort, CLUSTER_SCOPE,
};

/// A path into a JSON document. Numeric segments index into arrays.
pub type FieldPath = &'static [&'static str];

pub const NAME: &[FieldPath] = &[&["metadata", "name"], &["name"]];
pub const NAMESPACE: &[FieldPath] = &[&["metadata", "namespace"], &["namespace"]];
pub const CREATION_TIMESTAMP: &[FieldPath] = &[&["metadata", "creationTimestamp"], &["creationTimestamp"]];
pub const LABELS: &[FieldPath] = &[&["metadata", "labels"], &["labels"]];
pub const OWNER_REFERENCES: &[FieldPath] = &[&["metadata", "ownerReferences"], &["ownerReferences"]];
pub const NODE_NAME: &[FieldPath] = &[&["spec", "nodeName"], &["nodeName"]];
pub const REPLICAS: &[FieldPath] = &[&["spec", "replicas"], &["replicas"]];
pub const READY_REPLICAS: &[FieldPath] = &[&["status", "readyReplicas"], &["readyReplicas"]];
pub const SELECTOR: &[FieldPath] = &[&["spec", "selector"], &["selector"]];
pub const PORTS: &[FieldPath] = &[&["spec", "ports"], &["ports"]];
pub const CLUSTER_IP: &[FieldPath] = &[&["spec", "clusterIP"], &["clusterIP"]];
pub const SERVICE_TYPE: &[FieldPath] = &[&["spec", "type"], &["serviceType"], &["type"]];
pub const CONTAINER_STATUSES: &[FieldPath] = &[&["status", "containerStatuses"], &["containerStatuses"]];
pub const RULES: &[FieldPath] = &[&["spec", "rules"], &["rules"]];
pub const VOLUME_NAME: &[FieldPath] = &[&["spec", "volumeName"], &["volumeName"]];
pub const CURRENT_UTILIZATION: &[FieldPath] = &[
    &["status", "currentCPUUtilizationPercentage"],
    &["status", "currentMetrics", "0", "resource", "current", "averageUtilization"],
    &["currentUtilization"],
];
pub const TARGET_UTILIZATION: &[FieldPath] = &[
    &["spec", "targetCPUUtilizationPercentage"],
    &["spec", "metrics", "0", "resource", "target", "averageUtilization"],
    &["targetUtilization"],
];
pub const SCALE_TARGET: &[FieldPath] = &[&["spec", "scaleTargetRef"], &["scaleTarget"]];
pub const VOLUMES: &[FieldPath] = &[&["spec", "volumes"], &["volumes"]];
pub const CONTAINERS: &[FieldPath] = &[&["spec", "containers"], &["containers"]];
pub const INIT_CONTAINERS: &[FieldPath] = &[&["spec", "initContainers"], &["initContainers"]];
pub const REFERENCES: &[FieldPath] = &[&["references"]];
pub const CONDITIONS: &[FieldPath] = &[&["status", "conditions"], &["conditions"]];

const BACKEND_SERVICE_NAME: &[FieldPath] = &[
    &["backend", "service", "name"],
    &["backend", "serviceName"],
    &["serviceName"],
];
const BACKEND_SERVICE_PORT: &[FieldPath] = &[
    &["backend", "service", "port", "number"],
    &["backend", "service", "port", "name"],
    &["backend", "servicePort"],
    &["servicePort"],
];
const RULE_PATHS: &[FieldPath] = &[&["http", "paths"], &["paths"]];

/// Outcome of normalizing one raw response
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub resources: Vec<NormalizedResource>,
    /// Items that could not be turned into a resource and were omitted
    pub skipped: usize,
}

/// Normalize a raw response, dropping unrecognizable items
pub fn normalize(raw: &Value, kind: ResourceKind) -> Vec<NormalizedResource> {
    normalize_with_report(raw, kind).resources
}

/// Normalize a raw response and count the items that were skipped
pub fn normalize_with_report(raw: &Value, kind: ResourceKind) -> NormalizeReport {
    let Some(items) = extract_items(raw, kind) else {
        tracing::debug!("No {} list found in response", kind.plural());
        return NormalizeReport::default();
    };

    let mut report = NormalizeReport::default();
    for item in items {
        match normalize_item(item, kind) {
            Some(resource) => report.resources.push(resource),
            None => report.skipped += 1,
        }
    }

    if report.skipped > 0 {
        tracing::warn!("Skipped {} malformed {} records", report.skipped, kind.plural());
    }
    report
}

/// Locate the item list: `{"<kind>s": [...]}`, `{"items": [...]}` or a bare array
fn extract_items(raw: &Value, kind: ResourceKind) -> Option<&Vec<Value>> {
    if let Value::Array(items) = raw {
        return Some(items);
    }
    for key in kind.collection_keys() {
        if let Some(value) = raw.get(key) {
            return value.as_array();
        }
    }
    raw.get("items").and_then(Value::as_array)
}

/// Follow a single path
pub fn lookup<'a>(item: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(item, |current, segment| match current {
        Value::Array(values) => segment.parse::<usize>().ok().and_then(|i| values.get(i)),
        _ => current.get(*segment),
    })
}

/// First non-null value among `paths`
pub fn resolve<'a>(item: &'a Value, paths: &[FieldPath]) -> Option<&'a Value> {
    paths
        .iter()
        .find_map(|path| lookup(item, path).filter(|v| !v.is_null()))
}

fn resolve_str(item: &Value, paths: &[FieldPath]) -> Option<String> {
    resolve(item, paths).and_then(scalar_string)
}

fn resolve_i64(item: &Value, paths: &[FieldPath]) -> Option<i64> {
    resolve(item, paths).and_then(as_i64)
}

fn resolve_array<'a>(item: &'a Value, paths: &[FieldPath]) -> &'a [Value] {
    resolve(item, paths)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| scalar_string(v).map(|v| (k.clone(), v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Derive a display status. First match wins:
/// `status.phase`, `status.status`, a plain-string `status`, the
/// conditions list, any status object ("Active"), otherwise "Unknown".
pub fn derive_status(item: &Value) -> String {
    let status = item.get("status");

    if let Some(phase) = non_empty_str(status.and_then(|s| s.get("phase"))) {
        return phase;
    }
    if let Some(inner) = non_empty_str(status.and_then(|s| s.get("status"))) {
        return inner;
    }
    if let Some(plain) = non_empty_str(status) {
        return plain;
    }

    let conditions = resolve_array(item, CONDITIONS);
    if !conditions.is_empty() {
        let is_true = |cond: &Value, wanted: &str| {
            cond.get("type").and_then(Value::as_str) == Some(wanted)
                && cond.get("status").and_then(Value::as_str) == Some("True")
        };
        if conditions.iter().any(|c| is_true(c, "Available")) {
            return "Available".to_string();
        }
        if conditions.iter().any(|c| is_true(c, "Progressing")) {
            return "Progressing".to_string();
        }
        if let Some(reason) = non_empty_str(conditions[0].get("reason")) {
            return reason;
        }
    }

    if matches!(status, Some(Value::Object(_))) {
        return "Active".to_string();
    }
    "Unknown".to_string()
}

fn normalize_item(item: &Value, kind: ResourceKind) -> Option<NormalizedResource> {
    if !item.is_object() {
        return None;
    }
    let name = resolve_str(item, NAME)?;
    let namespace = if kind.is_cluster_scoped() {
        CLUSTER_SCOPE.to_string()
    } else {
        resolve_str(item, NAMESPACE).unwrap_or_else(|| CLUSTER_SCOPE.to_string())
    };

    let mut resource = NormalizedResource::new(kind, name, namespace);
    resource.id = resource_id(kind, &resource.namespace, &resource.name);
    resource.status = derive_status(item);
    resource.creation_timestamp = resolve(item, CREATION_TIMESTAMP)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    resource.labels = string_map(resolve(item, LABELS));
    resource.owner_references = owner_references(item);
    resource.replicas = resolve_i64(item, REPLICAS);
    resource.ready_replicas = resolve_i64(item, READY_REPLICAS);

    match kind {
        ResourceKind::Pod => {
            resource.node_name = resolve_str(item, NODE_NAME);
            resource.container_statuses = container_statuses(item);
            resource.references = pod_references(item);
        }
        ResourceKind::Service => {
            resource.selector = selector(item);
            resource.ports = service_ports(item);
            resource.cluster_ip = resolve_str(item, CLUSTER_IP);
            resource.service_type = resolve_str(item, SERVICE_TYPE);
        }
        ResourceKind::Ingress => {
            resource.rules = ingress_rules(item);
        }
        ResourceKind::PersistentVolumeClaim => {
            resource.volume_name = resolve_str(item, VOLUME_NAME);
        }
        ResourceKind::HorizontalPodAutoscaler => {
            resource.current_utilization = resolve_i64(item, CURRENT_UTILIZATION);
            resource.target_utilization = resolve_i64(item, TARGET_UTILIZATION);
            resource.scale_target = scale_target(item);
        }
        ResourceKind::Deployment
        | ResourceKind::ReplicaSet
        | ResourceKind::StatefulSet
        | ResourceKind::DaemonSet
        | ResourceKind::Job => {
            resource.selector = selector(item);
        }
        _ => {}
    }

    Some(resource)
}

fn owner_references(item: &Value) -> Vec<OwnerReference> {
    resolve_array(item, OWNER_REFERENCES)
        .iter()
        .filter_map(|r| {
            Some(OwnerReference {
                kind: non_empty_str(r.get("kind"))?,
                name: non_empty_str(r.get("name"))?,
                uid: non_empty_str(r.get("uid")),
            })
        })
        .collect()
}

/// Workload selectors nest under `matchLabels`; service selectors are a plain map
fn selector(item: &Value) -> BTreeMap<String, String> {
    let value = resolve(item, SELECTOR);
    match value.and_then(|v| v.get("matchLabels")) {
        Some(match_labels) => string_map(Some(match_labels)),
        None => string_map(value),
    }
}

fn service_ports(item: &Value) -> Vec<ServicePort> {
    resolve_array(item, PORTS)
        .iter()
        .filter(|p| p.is_object())
        .map(|p| ServicePort {
            name: non_empty_str(p.get("name")),
            port: p.get("port").and_then(as_i64),
            target_port: p.get("targetPort").and_then(|t| match t {
                Value::Number(_) => as_i64(t).map(TargetPort::Number),
                Value::String(s) if s.is_empty() => None,
                Value::String(s) => Some(
                    s.parse()
                        .map(TargetPort::Number)
                        .unwrap_or_else(|_| TargetPort::Name(s.clone())),
                ),
                _ => None,
            }),
            protocol: non_empty_str(p.get("protocol")),
        })
        .collect()
}

fn container_statuses(item: &Value) -> Vec<ContainerStatus> {
    resolve_array(item, CONTAINER_STATUSES)
        .iter()
        .filter_map(|c| {
            let state = match c.get("state") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Object(map)) => map.keys().next().cloned(),
                _ => None,
            };
            Some(ContainerStatus {
                name: non_empty_str(c.get("name"))?,
                ready: c.get("ready").and_then(Value::as_bool).unwrap_or(false),
                restart_count: c.get("restartCount").and_then(as_i64).unwrap_or(0),
                state,
            })
        })
        .collect()
}

fn ingress_rules(item: &Value) -> Vec<IngressRule> {
    resolve_array(item, RULES)
        .iter()
        .filter(|r| r.is_object())
        .map(|rule| IngressRule {
            host: non_empty_str(rule.get("host")),
            paths: resolve_array(rule, RULE_PATHS)
                .iter()
                .map(|p| IngressPath {
                    path: non_empty_str(p.get("path")).unwrap_or_else(|| "/".to_string()),
                    service_name: resolve_str(p, BACKEND_SERVICE_NAME),
                    service_port: resolve_str(p, BACKEND_SERVICE_PORT),
                })
                .collect(),
        })
        .collect()
}

fn scale_target(item: &Value) -> Option<ScaleTargetRef> {
    let target = resolve(item, SCALE_TARGET)?;
    Some(ScaleTargetRef {
        kind: non_empty_str(target.get("kind"))?,
        name: non_empty_str(target.get("name"))?,
    })
}

fn pod_references(item: &Value) -> Vec<PodReference> {
    let mut refs: Vec<PodReference> = Vec::new();
    let mut push = |kind: ResourceKind, name: Option<String>, source: ReferenceSource| {
        if let Some(name) = name {
            let reference = PodReference { kind, name, source };
            if !refs.contains(&reference) {
                refs.push(reference);
            }
        }
    };

    for volume in resolve_array(item, VOLUMES) {
        push(
            ResourceKind::ConfigMap,
            resolve_str(volume, &[&["configMap", "name"]]),
            ReferenceSource::Volume,
        );
        push(
            ResourceKind::Secret,
            resolve_str(volume, &[&["secret", "secretName"]]),
            ReferenceSource::Volume,
        );
        push(
            ResourceKind::PersistentVolumeClaim,
            resolve_str(volume, &[&["persistentVolumeClaim", "claimName"]]),
            ReferenceSource::Volume,
        );
    }

    let containers = resolve_array(item, CONTAINERS)
        .iter()
        .chain(resolve_array(item, INIT_CONTAINERS));
    for container in containers {
        for source in container
            .get("envFrom")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
        {
            push(
                ResourceKind::ConfigMap,
                resolve_str(source, &[&["configMapRef", "name"]]),
                ReferenceSource::EnvFrom,
            );
            push(
                ResourceKind::Secret,
                resolve_str(source, &[&["secretRef", "name"]]),
                ReferenceSource::EnvFrom,
            );
        }
    }

    // Already-normalized records carry their references verbatim
    for value in resolve_array(item, REFERENCES) {
        if let Ok(reference) = serde_json::from_value::<PodReference>(value.clone()) {
            push(reference.kind, Some(reference.name), reference.source);
        }
    }

    refs
}
