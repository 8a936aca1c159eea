//! kubescope CLI - Kubernetes context and topology gateway

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, config as config_cmd, context, graph, serve};
use config::Config;
use kubescope_context::{ContextRegistry, ContextSource, KubeconfigSource};
use kubescope_core::TopologyService;
use kubescope_mcp::KubectlClient;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "kubescope")]
#[command(author, version, about = "Kubernetes context and topology gateway for AI assistants")]
pub struct Cli {
    /// Path to the kubeconfig file
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Context to use instead of the kubeconfig's current context
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Namespace to use for the selected context
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Output format: table, json
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from(self.format.as_str())
    }

    /// Kubeconfig path: flag, then config file. `None` defers to KUBECONFIG and ~/.kube/config.
    pub fn kubeconfig_path(&self, config: &Config) -> Option<PathBuf> {
        self.kubeconfig.clone().or_else(|| config.kubeconfig.clone())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the MCP server
    Serve(serve::ServeArgs),
    /// Inspect cluster contexts
    Context(context::ContextArgs),
    /// Build a resource graph from files or a live cluster
    Graph(graph::GraphArgs),
    /// Manage configuration
    Config(config_cmd::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context shared by commands that talk to clusters
pub struct AppContext {
    pub config: Config,
    pub registry: Arc<ContextRegistry>,
    pub topology: Arc<TopologyService>,
    pub kubectl: Arc<KubectlClient>,
}

impl AppContext {
    /// Load contexts and apply `--context` / `--namespace` to the starting session
    pub fn new(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let kubeconfig = cli.kubeconfig_path(&config);
        tracing::debug!("Using kubeconfig: {:?}", kubeconfig);

        let registry = ContextRegistry::new(Arc::new(KubeconfigSource::new(kubeconfig.clone())))?;
        if let Some(name) = &cli.context {
            registry.switch_context(name)?;
        }

        let active = registry.current_context_name();
        let namespace = cli.namespace.clone().or_else(|| {
            config
                .default_namespace
                .clone()
                .filter(|_| !context_names_namespace(&registry, &active))
        });
        if let Some(ns) = namespace {
            registry.set_namespace_for_context(&active, &ns)?;
        }

        config.layout.validate()?;
        let topology = Arc::new(TopologyService::new(config.layout.clone()));
        let kubectl = KubectlClient::new(&config.kubectl)
            .with_kubeconfig(kubeconfig)
            .with_timeout(config.command_timeout());

        Ok(Self {
            config,
            registry: Arc::new(registry),
            topology,
            kubectl: Arc::new(kubectl),
        })
    }
}

/// Whether the kubeconfig entry for `name` sets its own namespace
fn context_names_namespace(registry: &ContextRegistry, name: &str) -> bool {
    registry
        .source()
        .load()
        .ok()
        .and_then(|config| config.contexts.into_iter().find(|c| c.name == name))
        .map_or(false, |entry| entry.namespace.is_some())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries MCP traffic and command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting kubescope CLI");

    match &cli.command {
        Commands::Serve(args) => serve::run(args, &cli).await?,
        Commands::Context(args) => context::run(args, &cli)?,
        Commands::Graph(args) => graph::run(args, &cli).await?,
        Commands::Config(args) => config_cmd::run(args, &cli)?,
        Commands::Completions(args) => completions::run(args)?,
    }

    Ok(())
}
