//! Config commands: inspect and edit the kubescope config file

use std::collections::BTreeMap;

use clap::{Args, Subcommand};

use crate::config::{config_file_path, Config};
use crate::output::{render_table, to_json, OutputFormat};
use crate::Cli;

const NOT_SET: &str = "(not set)";

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print one value, e.g. layout.iterations
    Get { key: String },
    /// Change one value; an empty string clears optional keys
    Set { key: String, value: String },
    /// Put one value back to its default
    Reset { key: String },
    /// Show every key with its current and default value
    List,
    /// Print where the config file lives
    Path,
    /// Check the config file strictly, including the layout constants
    Check,
    /// Write a config file, seeded from --kubeconfig and --namespace
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: &ConfigArgs, cli: &Cli) -> anyhow::Result<()> {
    match &args.command {
        ConfigCommands::Get { key } => {
            let config = Config::load();
            anyhow::ensure!(Config::keys().contains(&key.as_str()), "Unknown config key: {}", key);
            println!("{}", display(config.get(key)));
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load();
            let before = display(config.get(key));
            config.set(key, value)?;
            config.save()?;
            println!("{}: {} -> {}", key, before, display(config.get(key)));
        }
        ConfigCommands::Reset { key } => {
            let mut config = Config::load();
            config.reset(key)?;
            config.save()?;
            println!("{} reset to {}", key, display(config.get(key)));
        }
        ConfigCommands::List => list(cli.output_format())?,
        ConfigCommands::Path => println!("{}", config_file_path().display()),
        ConfigCommands::Check => match Config::check()? {
            Some(_) => println!("{}: ok", config_file_path().display()),
            None => println!("{}: not found, defaults apply", config_file_path().display()),
        },
        ConfigCommands::Init { force } => init(cli, *force)?,
    }
    Ok(())
}

fn display(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_SET.to_string())
}

fn list(format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load();
    let defaults = Config::default();

    match format {
        OutputFormat::Json => {
            let values: BTreeMap<&str, Option<String>> =
                Config::keys().iter().map(|key| (*key, config.get(key))).collect();
            println!("{}", to_json(&values)?);
        }
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = Config::keys()
                .iter()
                .map(|key| {
                    let value = config.get(key);
                    let marker = if value == defaults.get(key) { "" } else { "*" };
                    vec![format!("{}{}", key, marker), display(value), display(defaults.get(key))]
                })
                .collect();
            print!("{}", render_table(&["KEY", "VALUE", "DEFAULT"], &rows));
        }
    }
    Ok(())
}

fn init(cli: &Cli, force: bool) -> anyhow::Result<()> {
    let path = config_file_path();
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to replace it", path.display());
    }

    let mut config = Config::default();
    if let Some(kubeconfig) = &cli.kubeconfig {
        config.set("kubeconfig", &kubeconfig.display().to_string())?;
    }
    if let Some(namespace) = &cli.namespace {
        config.set("default_namespace", namespace)?;
    }
    config.save()?;
    println!("Wrote {}", path.display());
    Ok(())
}
