//! Graph command: build a positioned resource graph

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use serde_json::Value;

use crate::config::Config;
use crate::output::{render_table, to_json, OutputFormat};
use crate::{AppContext, Cli};
use kubescope_core::limits::validate_depth;
use kubescope_core::{
    FetchScope, GraphEdge, GraphNode, GraphSnapshot, LayoutEngine, Neighborhood, NeighborhoodQuery, ResourceKind,
};

#[derive(Args)]
pub struct GraphArgs {
    /// Raw JSON file (kubectl get -o json output); repeatable
    #[arg(short, long = "input", value_name = "FILE", conflicts_with = "live")]
    pub inputs: Vec<PathBuf>,

    /// Kind of the input files (one for all, or one per file), or kinds to fetch with --live.
    /// Input kinds are inferred from each document when omitted.
    #[arg(short, long)]
    pub kind: Vec<String>,

    /// Fetch resources from the cluster with kubectl
    #[arg(long)]
    pub live: bool,

    /// Fetch across all namespaces (with --live)
    #[arg(short = 'A', long, requires = "live")]
    pub all_namespaces: bool,

    /// Show only the neighborhood of this resource id, e.g. Deployment/default/web
    #[arg(long, value_name = "ID")]
    pub explore: Option<String>,

    /// Hops to follow with --explore
    #[arg(long, default_value = "2")]
    pub depth: u32,
}

pub async fn run(args: &GraphArgs, cli: &Cli) -> anyhow::Result<()> {
    let snapshot = if args.live {
        build_live(args, cli).await?
    } else if !args.inputs.is_empty() {
        build_offline(args)?
    } else {
        anyhow::bail!("Nothing to graph: pass --input FILE or --live");
    };

    for error in &snapshot.fetch_errors {
        eprintln!("warning: could not fetch {}: {}", error.kind.plural(), error.message);
    }
    if snapshot.skipped > 0 {
        tracing::warn!("Skipped {} malformed records", snapshot.skipped);
    }

    let format = cli.output_format();
    match &args.explore {
        Some(id) => print_neighborhood(&snapshot, id, args.depth, format),
        None => print_graph(&snapshot, format),
    }
}

fn build_offline(args: &GraphArgs) -> anyhow::Result<GraphSnapshot> {
    let kinds = parse_kinds(&args.kind)?;
    if kinds.len() > 1 && kinds.len() != args.inputs.len() {
        anyhow::bail!(
            "Got {} kinds for {} input files; pass one kind for all files or one per file",
            kinds.len(),
            args.inputs.len()
        );
    }

    let mut batches = Vec::with_capacity(args.inputs.len());
    for (i, path) in args.inputs.iter().enumerate() {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let raw: Value = serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))?;
        let kind = match kinds.len() {
            0 => infer_kind(&raw)
                .with_context(|| format!("Cannot infer the kind of {}; pass --kind", path.display()))?,
            1 => kinds[0],
            _ => kinds[i],
        };
        tracing::debug!("Loaded {} as {}", path.display(), kind);
        batches.push((kind, as_collection(raw)));
    }

    let config = Config::load();
    config.layout.validate()?;
    let engine = LayoutEngine::new(config.layout);
    Ok(GraphSnapshot::from_raw(&batches, &engine)?)
}

async fn build_live(args: &GraphArgs, cli: &Cli) -> anyhow::Result<GraphSnapshot> {
    let ctx = AppContext::new(cli, Config::load())?;
    let session = ctx.registry.get_current();

    let mut scope = FetchScope::new()
        .with_context(session.context)
        .with_kinds(parse_kinds(&args.kind)?);
    if !args.all_namespaces {
        scope = scope.with_namespace(session.namespace);
    }

    let snapshot = ctx.topology.refresh(ctx.kubectl.as_ref(), scope).await?;
    Ok(snapshot.as_ref().clone())
}

fn parse_kinds(kinds: &[String]) -> anyhow::Result<Vec<ResourceKind>> {
    kinds
        .iter()
        .map(|k| k.parse::<ResourceKind>().map_err(anyhow::Error::from))
        .collect()
}

/// Kind of a raw document from its `kind` field: `PodList`, `Pod`, or the first item's kind
fn infer_kind(raw: &Value) -> Option<ResourceKind> {
    let from_str = |kind: &str| kind.strip_suffix("List").unwrap_or(kind).parse::<ResourceKind>().ok();

    if let Some(kind) = raw.get("kind").and_then(Value::as_str) {
        if kind != "List" {
            return from_str(kind);
        }
    }
    let first = match raw {
        Value::Array(items) => items.first(),
        _ => raw.get("items").and_then(Value::as_array).and_then(|items| items.first()),
    }?;
    first.get("kind").and_then(Value::as_str).and_then(from_str)
}

/// `kubectl get KIND NAME -o json` yields one object; treat it as a one-item list
fn as_collection(raw: Value) -> Value {
    let single = raw.get("metadata").is_some() && raw.get("items").is_none();
    if single {
        Value::Array(vec![raw])
    } else {
        raw
    }
}

fn node_rows<'a>(nodes: impl IntoIterator<Item = &'a GraphNode>) -> Vec<Vec<String>> {
    nodes
        .into_iter()
        .map(|n| {
            let r = &n.resource;
            vec![
                r.kind.to_string(),
                r.namespace.clone(),
                r.name.clone(),
                r.status.clone(),
                format!("{:.1}", n.x),
                format!("{:.1}", n.y),
                format!("{:.1}", n.z),
            ]
        })
        .collect()
}

fn edge_rows(edges: &[GraphEdge]) -> Vec<Vec<String>> {
    edges
        .iter()
        .map(|e| vec![e.edge_type.to_string(), e.source.clone(), e.target.clone(), e.label.clone().unwrap_or_default()])
        .collect()
}

fn print_graph(snapshot: &GraphSnapshot, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(snapshot)?),
        OutputFormat::Table => {
            println!(
                "Graph: {} resources, {} relationships ({} iterations{})",
                snapshot.nodes.len(),
                snapshot.edges.len(),
                snapshot.layout.iterations_run,
                if snapshot.layout.timed_out { ", timed out" } else { "" }
            );
            println!();
            print!(
                "{}",
                render_table(
                    &["KIND", "NAMESPACE", "NAME", "STATUS", "X", "Y", "Z"],
                    &node_rows(&snapshot.nodes)
                )
            );
            if !snapshot.edges.is_empty() {
                println!();
                print!(
                    "{}",
                    render_table(&["TYPE", "SOURCE", "TARGET", "LABEL"], &edge_rows(&snapshot.edges))
                );
            }
        }
    }
    Ok(())
}

fn print_neighborhood(snapshot: &GraphSnapshot, id: &str, depth: u32, format: OutputFormat) -> anyhow::Result<()> {
    validate_depth(depth)?;
    let query = NeighborhoodQuery::new(id).with_depth(depth);
    let result = Neighborhood::explore(&query, &snapshot.nodes, &snapshot.edges)
        .with_context(|| format!("Resource not found in graph: {}", id))?;

    match format {
        OutputFormat::Json => println!("{}", to_json(&result)?),
        OutputFormat::Table => {
            println!(
                "Neighborhood of {} ({} resources within {} hops):",
                result.start,
                result.nodes.len(),
                depth
            );
            println!();
            let rows: Vec<Vec<String>> = result
                .nodes
                .iter()
                .map(|n| {
                    let hops = result.depths.get(n.id()).copied().unwrap_or_default();
                    vec![hops.to_string(), n.id().to_string(), n.resource.status.clone()]
                })
                .collect();
            print!("{}", render_table(&["DEPTH", "ID", "STATUS"], &rows));
            if !result.edges.is_empty() {
                println!();
                print!(
                    "{}",
                    render_table(&["TYPE", "SOURCE", "TARGET", "LABEL"], &edge_rows(&result.edges))
                );
            }
        }
    }
    Ok(())
}
