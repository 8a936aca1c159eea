//! MCP tool definitions

use serde::Serialize;

/// MCP tool definition
#[derive(Debug, Serialize)]
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Tools that need a kubectl binary
pub const CLUSTER_TOOLS: &[&str] = &["get_cluster_version", "refresh_resource_graph", "describe_resource"];

/// Get all available tools
pub fn get_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "list_contexts",
            description: "List all known cluster contexts with their cluster endpoint and namespaces.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "get_current_context",
            description: "Get the active context and namespace used by every other tool.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "get_context_details",
            description: "Get details about one context. Defaults to the active context.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "contextName": {"type": "string", "description": "Context name (default: active context)"}
                }
            }),
        },
        Tool {
            name: "switch_context",
            description: "Make a context active. Subsequent tool calls target it and its last-used namespace.",
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["contextName"],
                "properties": {
                    "contextName": {"type": "string", "description": "Context to switch to"}
                }
            }),
        },
        Tool {
            name: "set_namespace_for_context",
            description: "Set the namespace used with a context. Applies immediately if the context is active.",
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["namespace"],
                "properties": {
                    "namespace": {"type": "string", "description": "Namespace (RFC 1123 label)"},
                    "contextName": {"type": "string", "description": "Context to modify (default: active context)"}
                }
            }),
        },
        Tool {
            name: "reload_contexts",
            description: "Re-read the cluster configuration, adding new contexts and dropping removed ones.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "get_cluster_info",
            description: "Show the cluster name, API endpoint and namespace for a context, plus kubectl cluster-info output when cluster access is enabled.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "context": {"type": "string", "description": "Context to query (default: active context)"}
                }
            }),
        },
        Tool {
            name: "get_cluster_version",
            description: "Show client and server Kubernetes versions for a cluster.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "context": {"type": "string", "description": "Context to query (default: active context)"}
                }
            }),
        },
        Tool {
            name: "build_resource_graph",
            description: "Build a positioned resource graph from raw Kubernetes JSON supplied in the call (kubectl get -o json output, bare arrays or single objects). Replaces the current graph.",
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["documents"],
                "properties": {
                    "documents": {
                        "type": "array",
                        "description": "Raw documents, one per kind",
                        "items": {
                            "type": "object",
                            "required": ["kind", "data"],
                            "properties": {
                                "kind": {"type": "string", "description": "Resource kind, e.g. pods, svc, Deployment"},
                                "data": {"description": "Raw JSON for that kind"}
                            }
                        }
                    }
                }
            }),
        },
        Tool {
            name: "refresh_resource_graph",
            description: "Fetch resources with kubectl, infer ownership/network/storage/config relationships and lay the graph out. Node positions stay stable across refreshes of the same scope. Returns a summary; use get_resource_graph for the full graph.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "context": {"type": "string", "description": "Context to query (default: active context)"},
                    "namespace": {"type": "string", "description": "Namespace filter (default: active namespace)"},
                    "allNamespaces": {"type": "boolean", "description": "Fetch across all namespaces", "default": false},
                    "kinds": {"type": "array", "items": {"type": "string"}, "description": "Kinds to fetch (default: common workload, network and storage kinds)"}
                }
            }),
        },
        Tool {
            name: "get_resource_graph",
            description: "Return the latest positioned graph: nodes with x/y/z coordinates and typed edges.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "kinds": {"type": "array", "items": {"type": "string"}, "description": "Only include these kinds"},
                    "namespace": {"type": "string", "description": "Only include this namespace"}
                }
            }),
        },
        Tool {
            name: "explore_resource",
            description: "Walk the graph outward from one resource and return its neighborhood.",
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["id"],
                "properties": {
                    "id": {"type": "string", "description": "Resource id, e.g. Pod/default/nginx-abc"},
                    "depth": {"type": "number", "description": "Maximum hops (default: 2, max: 16)"},
                    "direction": {"type": "string", "enum": ["outgoing", "incoming", "both"], "default": "both"},
                    "edgeTypes": {"type": "array", "items": {"type": "string", "enum": ["ownership", "network", "storage", "config"]}, "description": "Only follow these edge types"}
                }
            }),
        },
        Tool {
            name: "describe_resource",
            description: "Describe a single resource in human-readable form.",
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["kind", "name"],
                "properties": {
                    "kind": {"type": "string", "description": "Resource kind, e.g. pod, deploy, Service"},
                    "name": {"type": "string", "description": "Resource name"},
                    "namespace": {"type": "string", "description": "Namespace (default: active namespace)"},
                    "context": {"type": "string", "description": "Context (default: active context)"}
                }
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tool_names_are_unique() {
        let tools = get_tools();
        let names: HashSet<_> = tools.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), tools.len());
        for name in CLUSTER_TOOLS {
            assert!(names.contains(name));
        }
    }

    #[test]
    fn test_schemas_are_objects() {
        for tool in get_tools() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
        }
    }
}
