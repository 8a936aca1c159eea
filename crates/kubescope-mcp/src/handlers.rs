//! MCP tool handlers

use std::collections::HashSet;
use std::sync::Arc;

use kubescope_context::{ActiveSession, ContextDescriptor, ContextRegistry};
use kubescope_core::limits::{validate_depth, validate_resource_name};
use kubescope_core::{
    Direction, EdgeType, FetchScope, GraphSnapshot, LayoutEngine, Neighborhood, NeighborhoodQuery, ResourceKind,
    TopologyService,
};
use serde::{Deserialize, Serialize};

use crate::kubectl::KubectlClient;

/// MCP tool call request
#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// MCP tool call response
#[derive(Debug, Serialize)]
pub struct ToolCallResponse {
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "isError")]
    pub is_error: Option<bool>,
}

/// Content block for responses
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolCallResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text {
                text: content.into(),
            }],
            is_error: None,
        }
    }

    pub fn json<T: Serialize>(data: &T) -> Self {
        match serde_json::to_string_pretty(data) {
            Ok(json) => Self::text(json),
            Err(e) => Self::error(format!("JSON serialization error: {}", e)),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text {
                text: message.into(),
            }],
            is_error: Some(true),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// Parse tool arguments or return an error response
macro_rules! parse_args {
    ($ty:ty, $args:expr) => {
        match serde_json::from_value::<$ty>(if $args.is_null() {
            serde_json::json!({})
        } else {
            $args
        }) {
            Ok(a) => a,
            Err(e) => return ToolCallResponse::error(format!("Invalid arguments: {}", e)),
        }
    };
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextView {
    #[serde(flatten)]
    descriptor: ContextDescriptor,
    is_active: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphSummary<'a> {
    generation: u64,
    scope: &'a FetchScope,
    nodes: usize,
    edges: usize,
    kinds: std::collections::BTreeMap<ResourceKind, usize>,
    skipped: usize,
    fetch_errors: &'a [kubescope_core::FetchError],
    layout: kubescope_core::LayoutReport,
}

impl<'a> GraphSummary<'a> {
    fn of(snapshot: &'a GraphSnapshot) -> Self {
        Self {
            generation: snapshot.generation,
            scope: &snapshot.scope,
            nodes: snapshot.nodes.len(),
            edges: snapshot.edges.len(),
            kinds: snapshot.kind_counts(),
            skipped: snapshot.skipped,
            fetch_errors: &snapshot.fetch_errors,
            layout: snapshot.layout,
        }
    }
}

/// Tool handler that processes tool calls
pub struct ToolHandler {
    registry: Arc<ContextRegistry>,
    topology: Arc<TopologyService>,
    kubectl: Option<Arc<KubectlClient>>,
}

impl ToolHandler {
    pub fn new(registry: Arc<ContextRegistry>, topology: Arc<TopologyService>) -> Self {
        Self {
            registry,
            topology,
            kubectl: None,
        }
    }

    pub fn with_kubectl(mut self, kubectl: Arc<KubectlClient>) -> Self {
        self.kubectl = Some(kubectl);
        self
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    pub fn topology(&self) -> &Arc<TopologyService> {
        &self.topology
    }

    pub async fn handle(&self, request: ToolCallRequest) -> ToolCallResponse {
        tracing::debug!("Handling tool call: {}", request.name);

        match request.name.as_str() {
            "list_contexts" => self.list_contexts(),
            "get_current_context" => self.get_current_context(),
            "get_context_details" => self.get_context_details(request.arguments),
            "switch_context" => self.switch_context(request.arguments),
            "set_namespace_for_context" => self.set_namespace_for_context(request.arguments),
            "reload_contexts" => self.reload_contexts(),
            "get_cluster_info" => self.get_cluster_info(request.arguments).await,
            "get_cluster_version" => self.get_cluster_version(request.arguments).await,
            "build_resource_graph" => self.build_resource_graph(request.arguments).await,
            "refresh_resource_graph" => self.refresh_resource_graph(request.arguments).await,
            "get_resource_graph" => self.get_resource_graph(request.arguments),
            "explore_resource" => self.explore_resource(request.arguments),
            "describe_resource" => self.describe_resource(request.arguments).await,
            _ => ToolCallResponse::error(format!("Unknown tool: {}", request.name)),
        }
    }

    fn kubectl(&self) -> Result<&KubectlClient, ToolCallResponse> {
        self.kubectl
            .as_deref()
            .ok_or_else(|| ToolCallResponse::error("Cluster access is disabled (server started with --no-kubectl)"))
    }

    fn view(&self, descriptor: ContextDescriptor) -> ContextView {
        ContextView {
            is_active: self.registry.is_active(&descriptor.name),
            descriptor,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Context tools
    // ─────────────────────────────────────────────────────────────

    fn list_contexts(&self) -> ToolCallResponse {
        match self.registry.list_contexts() {
            Ok(contexts) => {
                let current = self.registry.get_current();
                let views: Vec<ContextView> = contexts.into_iter().map(|d| self.view(d)).collect();
                ToolCallResponse::json(&serde_json::json!({
                    "contexts": views,
                    "activeContext": current.context,
                    "total": views.len(),
                }))
            }
            Err(e) => ToolCallResponse::error(e.to_string()),
        }
    }

    fn get_current_context(&self) -> ToolCallResponse {
        ToolCallResponse::json(&self.registry.get_current())
    }

    fn get_context_details(&self, args: serde_json::Value) -> ToolCallResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            context_name: Option<String>,
        }
        let args = parse_args!(Args, args);
        let name = args
            .context_name
            .unwrap_or_else(|| self.registry.current_context_name());

        match self.registry.get_context(&name) {
            Ok(descriptor) => ToolCallResponse::json(&self.view(descriptor)),
            Err(e) => ToolCallResponse::error(e.to_string()),
        }
    }

    fn switch_context(&self, args: serde_json::Value) -> ToolCallResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            context_name: String,
        }
        let args = parse_args!(Args, args);

        match self.registry.switch_context(&args.context_name) {
            Ok(descriptor) => {
                let current = self.registry.get_current();
                ToolCallResponse::json(&serde_json::json!({
                    "message": format!("Switched to context: {}", descriptor.name),
                    "context": descriptor,
                    "namespace": current.namespace,
                }))
            }
            Err(e) => ToolCallResponse::error(e.to_string()),
        }
    }

    fn set_namespace_for_context(&self, args: serde_json::Value) -> ToolCallResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            namespace: String,
            context_name: Option<String>,
        }
        let args = parse_args!(Args, args);
        let name = args
            .context_name
            .unwrap_or_else(|| self.registry.current_context_name());

        match self.registry.set_namespace_for_context(&name, &args.namespace) {
            Ok(()) => ToolCallResponse::json(&serde_json::json!({
                "message": format!("Namespace for {} set to: {}", name, args.namespace),
                "context": name,
                "namespace": args.namespace,
                "active": self.registry.is_active(&name),
            })),
            Err(e) => ToolCallResponse::error(e.to_string()),
        }
    }

    fn reload_contexts(&self) -> ToolCallResponse {
        match self.registry.reload() {
            Ok(summary) => ToolCallResponse::json(&summary),
            Err(e) => ToolCallResponse::error(e.to_string()),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Cluster tools
    // ─────────────────────────────────────────────────────────────

    fn resolve(&self, context: Option<&str>, namespace: Option<&str>) -> Result<ActiveSession, ToolCallResponse> {
        self.registry
            .resolve(context, namespace)
            .map_err(|e| ToolCallResponse::error(e.to_string()))
    }

    async fn get_cluster_info(&self, args: serde_json::Value) -> ToolCallResponse {
        #[derive(Deserialize)]
        struct Args {
            context: Option<String>,
        }
        let args = parse_args!(Args, args);
        let session = match self.resolve(args.context.as_deref(), None) {
            Ok(s) => s,
            Err(resp) => return resp,
        };
        let descriptor = match self.registry.get_context(&session.context) {
            Ok(d) => d,
            Err(e) => return ToolCallResponse::error(e.to_string()),
        };

        let mut info = serde_json::json!({
            "context": session.context,
            "cluster": descriptor.cluster_name,
            "endpoint": descriptor.cluster_endpoint,
            "namespace": session.namespace,
        });
        if let Some(kubectl) = &self.kubectl {
            match kubectl.cluster_info(Some(&session.context)).await {
                Ok(text) => info["clusterInfo"] = serde_json::Value::String(text),
                Err(e) => return ToolCallResponse::error(e.to_string()),
            }
        }
        ToolCallResponse::json(&info)
    }

    async fn get_cluster_version(&self, args: serde_json::Value) -> ToolCallResponse {
        #[derive(Deserialize)]
        struct Args {
            context: Option<String>,
        }
        let args = parse_args!(Args, args);
        let kubectl = match self.kubectl() {
            Ok(k) => k,
            Err(resp) => return resp,
        };
        let session = match self.resolve(args.context.as_deref(), None) {
            Ok(s) => s,
            Err(resp) => return resp,
        };

        match kubectl.version(Some(&session.context)).await {
            Ok(version) => ToolCallResponse::json(&serde_json::json!({
                "context": session.context,
                "version": version,
            })),
            Err(e) => ToolCallResponse::error(e.to_string()),
        }
    }

    async fn describe_resource(&self, args: serde_json::Value) -> ToolCallResponse {
        #[derive(Deserialize)]
        struct Args {
            kind: String,
            name: String,
            namespace: Option<String>,
            context: Option<String>,
        }
        let args = parse_args!(Args, args);
        let kind: ResourceKind = match args.kind.parse() {
            Ok(k) => k,
            Err(e) => return ToolCallResponse::error(format!("{}", e)),
        };
        if let Err(e) = validate_resource_name(&args.name) {
            return ToolCallResponse::error(e.to_string());
        }
        let kubectl = match self.kubectl() {
            Ok(k) => k,
            Err(resp) => return resp,
        };
        let session = match self.resolve(args.context.as_deref(), args.namespace.as_deref()) {
            Ok(s) => s,
            Err(resp) => return resp,
        };

        match kubectl
            .describe(kind, &args.name, Some(&session.namespace), Some(&session.context))
            .await
        {
            Ok(text) => ToolCallResponse::text(text),
            Err(e) => ToolCallResponse::error(e.to_string()),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Graph tools
    // ─────────────────────────────────────────────────────────────

    async fn build_resource_graph(&self, args: serde_json::Value) -> ToolCallResponse {
        #[derive(Deserialize)]
        struct Document {
            kind: String,
            data: serde_json::Value,
        }
        #[derive(Deserialize)]
        struct Args {
            documents: Vec<Document>,
        }
        let args = parse_args!(Args, args);

        let mut batches = Vec::with_capacity(args.documents.len());
        for doc in args.documents {
            match doc.kind.parse::<ResourceKind>() {
                Ok(kind) => batches.push((kind, doc.data)),
                Err(e) => return ToolCallResponse::error(e.to_string()),
            }
        }

        let engine = LayoutEngine::new(self.topology.layout_config().clone());
        let built = tokio::task::spawn_blocking(move || GraphSnapshot::from_raw(&batches, &engine)).await;
        let snapshot = match built {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => return ToolCallResponse::error(e.to_string()),
            Err(e) => return ToolCallResponse::error(format!("Layout task failed: {}", e)),
        };

        match self.topology.publish(snapshot) {
            Ok(snapshot) => ToolCallResponse::json(&GraphSummary::of(&snapshot)),
            Err(e) => ToolCallResponse::error(e.to_string()),
        }
    }

    async fn refresh_resource_graph(&self, args: serde_json::Value) -> ToolCallResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            context: Option<String>,
            namespace: Option<String>,
            #[serde(default)]
            all_namespaces: bool,
            #[serde(default)]
            kinds: Vec<String>,
        }
        let args = parse_args!(Args, args);

        let kinds = match parse_kinds(&args.kinds) {
            Ok(k) => k,
            Err(resp) => return resp,
        };
        let kubectl = match self.kubectl() {
            Ok(k) => k,
            Err(resp) => return resp,
        };
        let session = match self.resolve(args.context.as_deref(), args.namespace.as_deref()) {
            Ok(s) => s,
            Err(resp) => return resp,
        };

        let mut scope = FetchScope::new().with_context(session.context).with_kinds(kinds);
        if !args.all_namespaces {
            scope = scope.with_namespace(session.namespace);
        }
        match self.topology.refresh(kubectl, scope).await {
            Ok(snapshot) => ToolCallResponse::json(&GraphSummary::of(&snapshot)),
            Err(e) => ToolCallResponse::error(e.to_string()),
        }
    }

    fn get_resource_graph(&self, args: serde_json::Value) -> ToolCallResponse {
        #[derive(Deserialize)]
        struct Args {
            #[serde(default)]
            kinds: Vec<String>,
            namespace: Option<String>,
        }
        let args = parse_args!(Args, args);
        let kinds = match parse_kinds(&args.kinds) {
            Ok(k) => k,
            Err(resp) => return resp,
        };
        let Some(snapshot) = self.topology.current() else {
            return ToolCallResponse::error("No graph has been built yet; call build_resource_graph first");
        };

        if kinds.is_empty() && args.namespace.is_none() {
            return ToolCallResponse::json(snapshot.as_ref());
        }

        let nodes: Vec<_> = snapshot
            .nodes
            .iter()
            .filter(|n| kinds.is_empty() || kinds.contains(&n.resource.kind))
            .filter(|n| args.namespace.as_ref().map_or(true, |ns| &n.resource.namespace == ns))
            .collect();
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id()).collect();
        let edges: Vec<_> = snapshot
            .edges
            .iter()
            .filter(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()))
            .collect();

        ToolCallResponse::json(&serde_json::json!({
            "generation": snapshot.generation,
            "nodes": nodes,
            "edges": edges,
        }))
    }

    fn explore_resource(&self, args: serde_json::Value) -> ToolCallResponse {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Args {
            id: String,
            depth: Option<u32>,
            #[serde(default)]
            direction: Direction,
            #[serde(default)]
            edge_types: Vec<EdgeType>,
        }
        let args = parse_args!(Args, args);

        let mut query = NeighborhoodQuery::new(&args.id)
            .with_direction(args.direction)
            .filter_edge_types(args.edge_types);
        if let Some(depth) = args.depth {
            if let Err(e) = validate_depth(depth) {
                return ToolCallResponse::error(e.to_string());
            }
            query = query.with_depth(depth);
        }

        let Some(snapshot) = self.topology.current() else {
            return ToolCallResponse::error("No graph has been built yet; call build_resource_graph first");
        };
        match Neighborhood::explore(&query, &snapshot.nodes, &snapshot.edges) {
            Some(result) => ToolCallResponse::json(&result),
            None => ToolCallResponse::error(format!("Resource not found in graph: {}", args.id)),
        }
    }
}

fn parse_kinds(kinds: &[String]) -> Result<Vec<ResourceKind>, ToolCallResponse> {
    kinds
        .iter()
        .map(|k| k.parse::<ResourceKind>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ToolCallResponse::error(e.to_string()))
}
