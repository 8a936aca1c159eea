//! Serve command: run the MCP server

use std::sync::Arc;

use clap::Args;

use crate::config::Config;
use crate::{AppContext, Cli};
use kubescope_mcp::{McpServer, ToolHandler};

#[derive(Args)]
pub struct ServeArgs {
    /// Serve MCP over HTTP/SSE on this address instead of stdio (e.g. 127.0.0.1:8080)
    #[arg(long, value_name = "ADDR")]
    pub sse: Option<String>,

    /// Bearer token required by the SSE transport
    #[arg(long, env = "KUBESCOPE_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Disable tools that run kubectl against the cluster
    #[arg(long)]
    pub no_kubectl: bool,
}

pub async fn run(args: &ServeArgs, cli: &Cli) -> anyhow::Result<()> {
    let ctx = AppContext::new(cli, Config::load())?;
    let session = ctx.registry.get_current();
    tracing::info!("Active context: {} (namespace {})", session.context, session.namespace);

    let mut handler = ToolHandler::new(ctx.registry.clone(), ctx.topology.clone());
    if args.no_kubectl {
        tracing::info!("Cluster access disabled");
    } else {
        tracing::info!("Cluster access through {}", ctx.config.kubectl);
        handler = handler.with_kubectl(ctx.kubectl.clone());
    }
    let server = Arc::new(McpServer::new(handler));

    match &args.sse {
        Some(addr) => serve_sse(server, addr, args.auth_token.clone()).await,
        None => server.run_stdio().await,
    }
}

#[cfg(feature = "sse")]
async fn serve_sse(server: Arc<McpServer>, addr: &str, auth_token: Option<String>) -> anyhow::Result<()> {
    if auth_token.is_none() {
        tracing::warn!("SSE transport running without an auth token");
    }
    kubescope_mcp::run_sse_server(server, addr, auth_token).await
}

#[cfg(not(feature = "sse"))]
async fn serve_sse(_server: Arc<McpServer>, _addr: &str, _auth_token: Option<String>) -> anyhow::Result<()> {
    anyhow::bail!("SSE transport not available: rebuild with --features sse")
}
