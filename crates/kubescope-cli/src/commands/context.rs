//! Context commands

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::output::{render_table, to_json, OutputFormat};
use crate::{AppContext, Cli};
use kubescope_context::ContextDescriptor;

#[derive(Args)]
pub struct ContextArgs {
    #[command(subcommand)]
    pub command: ContextCommands,
}

#[derive(Subcommand)]
pub enum ContextCommands {
    /// List all contexts
    List,
    /// Show the active context and namespace
    Current,
    /// Show details of one context
    Show {
        /// Context name
        name: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextRow<'a> {
    #[serde(flatten)]
    descriptor: &'a ContextDescriptor,
    is_active: bool,
}

pub fn run(args: &ContextArgs, cli: &Cli) -> anyhow::Result<()> {
    let ctx = AppContext::new(cli, Config::load())?;
    let format = cli.output_format();

    match &args.command {
        ContextCommands::List => {
            let contexts = ctx.registry.list_contexts()?;
            tracing::info!("Found {} contexts", contexts.len());
            let rows: Vec<ContextRow> = contexts
                .iter()
                .map(|descriptor| ContextRow {
                    descriptor,
                    is_active: ctx.registry.is_active(&descriptor.name),
                })
                .collect();

            match format {
                OutputFormat::Json => println!("{}", to_json(&rows)?),
                OutputFormat::Table => {
                    let table: Vec<Vec<String>> = rows
                        .iter()
                        .map(|row| {
                            let d = row.descriptor;
                            vec![
                                if row.is_active { "*".to_string() } else { String::new() },
                                d.name.clone(),
                                d.cluster_name.clone().unwrap_or_default(),
                                d.cluster_endpoint.clone().unwrap_or_default(),
                                d.effective_namespace().to_string(),
                            ]
                        })
                        .collect();
                    print!(
                        "{}",
                        render_table(&["CURRENT", "NAME", "CLUSTER", "SERVER", "NAMESPACE"], &table)
                    );
                }
            }
        }
        ContextCommands::Current => {
            let session = ctx.registry.get_current();
            match format {
                OutputFormat::Json => println!("{}", to_json(&session)?),
                OutputFormat::Table => {
                    println!("Context: {}", session.context);
                    println!("Namespace: {}", session.namespace);
                }
            }
        }
        ContextCommands::Show { name } => {
            let descriptor = ctx.registry.get_context(name)?;
            let row = ContextRow {
                descriptor: &descriptor,
                is_active: ctx.registry.is_active(name),
            };
            match format {
                OutputFormat::Json => println!("{}", to_json(&row)?),
                OutputFormat::Table => {
                    println!("Context: {}", descriptor.name);
                    println!("  Active: {}", if row.is_active { "yes" } else { "no" });
                    if let Some(cluster) = &descriptor.cluster_name {
                        println!("  Cluster: {}", cluster);
                    }
                    if let Some(endpoint) = &descriptor.cluster_endpoint {
                        println!("  Server: {}", endpoint);
                    }
                    println!("  Default namespace: {}", descriptor.default_namespace);
                    if let Some(ns) = &descriptor.last_accessed_namespace {
                        println!("  Last namespace: {}", ns);
                    }
                }
            }
        }
    }

    Ok(())
}
