//! Kubeconfig-backed context source

use kube::config::Kubeconfig;
use std::path::{Path, PathBuf};

use crate::error::{ContextError, ContextResult};
use crate::source::{ClusterConfig, ContextEntry, ContextSource};

/// Reads contexts from a kubeconfig file.
///
/// Without an explicit path the standard lookup applies: `$KUBECONFIG`, then
/// `~/.kube/config`.
#[derive(Debug, Clone, Default)]
pub struct KubeconfigSource {
    path: Option<PathBuf>,
}

impl KubeconfigSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::new(Some(path.as_ref().to_path_buf()))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read(&self) -> ContextResult<Kubeconfig> {
        let result = match &self.path {
            Some(path) => Kubeconfig::read_from(path),
            None => Kubeconfig::read(),
        };
        result.map_err(|e| ContextError::ConfigUnavailable(format!("{}: {}", self.describe(), e)))
    }
}

impl ContextSource for KubeconfigSource {
    fn load(&self) -> ContextResult<ClusterConfig> {
        Ok(to_cluster_config(self.read()?))
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "default kubeconfig".to_string(),
        }
    }
}

/// Parse kubeconfig YAML directly
pub fn parse_kubeconfig(yaml: &str) -> ContextResult<ClusterConfig> {
    Kubeconfig::from_yaml(yaml)
        .map(to_cluster_config)
        .map_err(|e| ContextError::ConfigUnavailable(e.to_string()))
}

fn to_cluster_config(kubeconfig: Kubeconfig) -> ClusterConfig {
    let servers: Vec<(String, Option<String>)> = kubeconfig
        .clusters
        .iter()
        .map(|c| (c.name.clone(), c.cluster.as_ref().and_then(|cluster| cluster.server.clone())))
        .collect();

    let contexts = kubeconfig
        .contexts
        .iter()
        .map(|named| {
            let cluster = named.context.as_ref().map(|c| c.cluster.clone());
            let server = cluster.as_ref().and_then(|cluster| {
                servers
                    .iter()
                    .find(|(name, _)| name == cluster)
                    .and_then(|(_, server)| server.clone())
            });
            ContextEntry {
                name: named.name.clone(),
                cluster,
                server,
                namespace: named
                    .context
                    .as_ref()
                    .and_then(|c| c.namespace.clone())
                    .filter(|ns| !ns.is_empty()),
            }
        })
        .collect();

    ClusterConfig {
        contexts,
        current_context: kubeconfig.current_context.filter(|c| !c.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: staging
clusters:
- name: prod-cluster
  cluster:
    server: https://prod.example.com:6443
- name: staging-cluster
  cluster:
    server: https://staging.example.com:6443
contexts:
- name: prod
  context:
    cluster: prod-cluster
    user: admin
    namespace: payments
- name: staging
  context:
    cluster: staging-cluster
    user: admin
users:
- name: admin
  user:
    token: redacted
"#;

    #[test]
    fn test_parse_kubeconfig() {
        let config = parse_kubeconfig(KUBECONFIG).unwrap();
        assert_eq!(config.current_context.as_deref(), Some("staging"));
        assert_eq!(config.contexts.len(), 2);

        let prod = &config.contexts[0];
        assert_eq!(prod.name, "prod");
        assert_eq!(prod.cluster.as_deref(), Some("prod-cluster"));
        assert_eq!(prod.server.as_deref(), Some("https://prod.example.com:6443"));
        assert_eq!(prod.namespace.as_deref(), Some("payments"));
        assert_eq!(config.contexts[1].namespace, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(KUBECONFIG.as_bytes()).unwrap();

        let source = KubeconfigSource::from_path(file.path());
        let config = source.load().unwrap();
        assert_eq!(config.contexts.len(), 2);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = KubeconfigSource::from_path(dir.path().join("nope"));
        assert!(matches!(source.load(), Err(ContextError::ConfigUnavailable(_))));
    }
}
