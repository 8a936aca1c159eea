//! kubectl subprocess client
//!
//! Raw cluster queries go through the `kubectl` binary so that every auth
//! plugin and kubeconfig feature the user already relies on keeps working.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

use kubescope_core::{FetchScope, ResourceKind, ResourceSource};

/// Default per-command timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Cap on text returned to a tool caller (64KB)
const MAX_TEXT_OUTPUT: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum KubectlError {
    #[error("Failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("kubectl {command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("kubectl {command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("Invalid kubectl output: {0}")]
    InvalidOutput(#[from] serde_json::Error),
}

/// Runs kubectl with a fixed binary, kubeconfig and timeout
#[derive(Debug, Clone)]
pub struct KubectlClient {
    binary: PathBuf,
    kubeconfig: Option<PathBuf>,
    timeout: Duration,
}

impl Default for KubectlClient {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl KubectlClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            kubeconfig: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_kubeconfig(mut self, path: Option<PathBuf>) -> Self {
        self.kubeconfig = path;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments for listing one kind in a scope
    pub fn get_args(kind: ResourceKind, scope: &FetchScope) -> Vec<String> {
        let mut args = vec!["get".to_string(), kind.plural().to_string()];
        if !kind.is_cluster_scoped() {
            match &scope.namespace {
                Some(ns) => args.extend(["--namespace".to_string(), ns.clone()]),
                None => args.push("--all-namespaces".to_string()),
            }
        }
        args.extend(["-o".to_string(), "json".to_string()]);
        args
    }

    /// List one kind as raw JSON
    pub async fn get(&self, kind: ResourceKind, scope: &FetchScope) -> Result<serde_json::Value, KubectlError> {
        let output = self.run(scope.context.as_deref(), Self::get_args(kind, scope)).await?;
        Ok(serde_json::from_str(&output)?)
    }

    /// Free-form description of one resource
    pub async fn describe(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: Option<&str>,
        context: Option<&str>,
    ) -> Result<String, KubectlError> {
        self.run(context, Self::describe_args(kind, name, namespace))
            .await
            .map(truncate)
    }

    /// Flags come before `--` so the name is always read as a positional argument
    fn describe_args(kind: ResourceKind, name: &str, namespace: Option<&str>) -> Vec<String> {
        let mut args = vec!["describe".to_string(), kind.plural().to_string()];
        if let (Some(ns), false) = (namespace, kind.is_cluster_scoped()) {
            args.extend(["--namespace".to_string(), ns.to_string()]);
        }
        args.extend(["--".to_string(), name.to_string()]);
        args
    }

    pub async fn cluster_info(&self, context: Option<&str>) -> Result<String, KubectlError> {
        self.run(context, vec!["cluster-info".to_string()]).await.map(truncate)
    }

    pub async fn version(&self, context: Option<&str>) -> Result<serde_json::Value, KubectlError> {
        let output = self
            .run(context, vec!["version".to_string(), "-o".to_string(), "json".to_string()])
            .await?;
        Ok(serde_json::from_str(&output)?)
    }

    async fn run(&self, context: Option<&str>, args: Vec<String>) -> Result<String, KubectlError> {
        let command_name = args.first().cloned().unwrap_or_default();
        let mut cmd = Command::new(&self.binary);
        if let Some(path) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(path);
        }
        if let Some(context) = context {
            cmd.arg("--context").arg(context);
        }
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Running {} {}", self.binary.display(), args.join(" "));

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| KubectlError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?,
            Err(_) => {
                return Err(KubectlError::Timeout {
                    command: command_name,
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(KubectlError::Failed {
                command: command_name,
                stderr: if stderr.is_empty() {
                    format!("exit status {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_TEXT_OUTPUT {
        let mut cut = MAX_TEXT_OUTPUT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("\n... (truncated)");
    }
    text
}

#[async_trait]
impl ResourceSource for KubectlClient {
    async fn fetch(&self, kind: ResourceKind, scope: &FetchScope) -> kubescope_core::Result<serde_json::Value> {
        self.get(kind, scope).await.map_err(|e| kubescope_core::Error::Source {
            kind: kind.plural().to_string(),
            message: e.to_string(),
        })
    }
}
