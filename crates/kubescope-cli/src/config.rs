//! CLI configuration

use std::path::PathBuf;
use std::time::Duration;

use kubescope_core::limits::validate_namespace;
use kubescope_core::LayoutConfig;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "KUBESCOPE_CONFIG";

/// Path of the config file
pub fn config_file_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kubescope")
        .join("config.toml")
}

/// Configuration for the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Kubeconfig path; unset means KUBECONFIG or ~/.kube/config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,
    /// kubectl binary
    pub kubectl: String,
    pub command_timeout_secs: u64,
    /// Namespace for the starting session when the context names none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,
    pub layout: LayoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            kubectl: "kubectl".to_string(),
            command_timeout_secs: 30,
            default_namespace: None,
            layout: LayoutConfig::default(),
        }
    }
}

const KEYS: &[&str] = &[
    "kubeconfig",
    "kubectl",
    "command_timeout_secs",
    "default_namespace",
    "layout.iterations",
    "layout.repulsion",
    "layout.attraction",
    "layout.ideal_distance",
    "layout.center_pull",
    "layout.damping",
    "layout.namespace_radius",
    "layout.ground_y",
    "layout.min_distance",
    "layout.deadline_ms",
];

impl Config {
    /// Load from the config file. A missing or unparsable file yields defaults,
    /// and an invalid layout section falls back to the default layout.
    pub fn load() -> Self {
        let path = config_file_path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return Self::default(),
        };
        let mut config: Self = match toml::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid config file {}: {}", path.display(), e);
                return Self::default();
            }
        };
        if let Err(e) = config.layout.validate() {
            tracing::warn!("Ignoring layout section of {}: {}", path.display(), e);
            config.layout = LayoutConfig::default();
        }
        config
    }

    /// Strictly read the config file. `Ok(None)` when there is no file.
    pub fn check() -> anyhow::Result<Option<Self>> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        let config: Self =
            toml::from_str(&text).map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        config.layout.validate()?;
        if let Some(ns) = &config.default_namespace {
            validate_namespace(ns)?;
        }
        anyhow::ensure!(config.command_timeout_secs > 0, "command_timeout_secs must be positive");
        Ok(Some(config))
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        KEYS
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let layout = &self.layout;
        let value = match key {
            "kubeconfig" => self.kubeconfig.as_ref().map(|p| p.display().to_string())?,
            "kubectl" => self.kubectl.clone(),
            "command_timeout_secs" => self.command_timeout_secs.to_string(),
            "default_namespace" => self.default_namespace.clone()?,
            "layout.iterations" => layout.iterations.to_string(),
            "layout.repulsion" => layout.repulsion.to_string(),
            "layout.attraction" => layout.attraction.to_string(),
            "layout.ideal_distance" => layout.ideal_distance.to_string(),
            "layout.center_pull" => layout.center_pull.to_string(),
            "layout.damping" => layout.damping.to_string(),
            "layout.namespace_radius" => layout.namespace_radius.to_string(),
            "layout.ground_y" => layout.ground_y.to_string(),
            "layout.min_distance" => layout.min_distance.to_string(),
            "layout.deadline_ms" => layout.deadline_ms?.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Set a key from its string form. An empty value clears optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let value = value.trim();
        if let Some(field) = key.strip_prefix("layout.") {
            let mut layout = self.layout.clone();
            set_layout_field(&mut layout, field, key, value)?;
            layout.validate()?;
            self.layout = layout;
            return Ok(());
        }
        match key {
            "kubeconfig" => self.kubeconfig = non_empty(value).map(PathBuf::from),
            "kubectl" => {
                anyhow::ensure!(!value.is_empty(), "kubectl must not be empty");
                self.kubectl = value.to_string();
            }
            "command_timeout_secs" => {
                let secs: u64 = parse(key, value)?;
                anyhow::ensure!(secs > 0, "command_timeout_secs must be positive");
                self.command_timeout_secs = secs;
            }
            "default_namespace" => {
                if let Some(ns) = non_empty(value) {
                    validate_namespace(ns)?;
                }
                self.default_namespace = non_empty(value).map(str::to_string);
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Put a key back to its default value
    pub fn reset(&mut self, key: &str) -> anyhow::Result<()> {
        if !KEYS.contains(&key) {
            return Err(unknown_key(key));
        }
        let default = Self::default().get(key).unwrap_or_default();
        self.set(key, &default)
    }
}

fn set_layout_field(layout: &mut LayoutConfig, field: &str, key: &str, value: &str) -> anyhow::Result<()> {
    match field {
        "iterations" => layout.iterations = parse(key, value)?,
        "repulsion" => layout.repulsion = parse(key, value)?,
        "attraction" => layout.attraction = parse(key, value)?,
        "ideal_distance" => layout.ideal_distance = parse(key, value)?,
        "center_pull" => layout.center_pull = parse(key, value)?,
        "damping" => layout.damping = parse(key, value)?,
        "namespace_radius" => layout.namespace_radius = parse(key, value)?,
        "ground_y" => layout.ground_y = parse(key, value)?,
        "min_distance" => layout.min_distance = parse(key, value)?,
        "deadline_ms" => {
            layout.deadline_ms = match non_empty(value) {
                Some(v) => Some(parse(key, v)?),
                None => None,
            }
        }
        _ => return Err(unknown_key(key)),
    }
    Ok(())
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow::anyhow!("Unknown config key: {} (available: {})", key, KEYS.join(", "))
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, value, e))
}
