//! End-to-end tests for the kubescope binary

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: dev
clusters:
- name: dev-cluster
  cluster:
    server: https://dev.example.com:6443
- name: prod-cluster
  cluster:
    server: https://prod.example.com:6443
contexts:
- name: dev
  context:
    cluster: dev-cluster
    user: admin
    namespace: apps
- name: prod
  context:
    cluster: prod-cluster
    user: admin
users:
- name: admin
  user:
    token: redacted
"#;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kubeconfig"), KUBECONFIG).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("kubescope").unwrap();
        cmd.env("KUBESCOPE_CONFIG", self.path("config.toml"))
            .env_remove("KUBECONFIG")
            .env_remove("RUST_LOG")
            .arg("--kubeconfig")
            .arg(self.path("kubeconfig"));
        cmd
    }
}

fn json_stdout(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}

fn write_sample_graph(env: &Env) -> (PathBuf, PathBuf) {
    let pods = env.write(
        "pods.json",
        r#"{"kind": "PodList", "items": [
            {"metadata": {"name": "web-1", "namespace": "shop", "labels": {"app": "web"}}, "status": {"phase": "Running"}}
        ]}"#,
    );
    let services = env.write(
        "services.json",
        r#"{"kind": "ServiceList", "items": [
            {"metadata": {"name": "web", "namespace": "shop"},
             "spec": {"selector": {"app": "web"}, "ports": [{"port": 80, "targetPort": 8080}]}}
        ]}"#,
    );
    (pods, services)
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("kubescope")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("context"))
        .stdout(predicate::str::contains("graph"));
}

#[test]
fn test_context_list_table() {
    let env = Env::new();
    env.cmd()
        .args(["context", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CURRENT"))
        .stdout(predicate::str::contains("https://prod.example.com:6443"))
        .stdout(predicate::str::is_match(r"\*\s+dev\s+dev-cluster").unwrap());
}

#[test]
fn test_context_list_json() {
    let env = Env::new();
    let output = env.cmd().args(["context", "list", "-f", "json"]).output().unwrap();
    assert!(output.status.success());

    let contexts = json_stdout(&output.stdout);
    let contexts = contexts.as_array().unwrap();
    assert_eq!(contexts.len(), 2);
    assert_eq!(contexts[0]["name"], "dev");
    assert_eq!(contexts[0]["isActive"], true);
    assert_eq!(contexts[0]["defaultNamespace"], "apps");
    assert_eq!(contexts[1]["defaultNamespace"], "default");
}

#[test]
fn test_context_overrides() {
    let env = Env::new();
    env.cmd()
        .args(["--context", "prod", "-n", "payments", "context", "current"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Context: prod"))
        .stdout(predicate::str::contains("Namespace: payments"));

    env.cmd()
        .args(["--context", "staging", "context", "current"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging"));

    env.cmd()
        .args(["-n", "Not_A_Namespace", "context", "current"])
        .assert()
        .failure();
}

#[test]
fn test_context_show() {
    let env = Env::new();
    env.cmd()
        .args(["context", "show", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Active: no"))
        .stdout(predicate::str::contains("Cluster: prod-cluster"));

    env.cmd().args(["context", "show", "missing"]).assert().failure();
}

#[test]
fn test_default_namespace_from_config() {
    let env = Env::new();
    env.cmd()
        .args(["config", "set", "default_namespace", "tools"])
        .assert()
        .success();

    // dev names its own namespace, prod does not
    env.cmd()
        .args(["context", "current"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Namespace: apps"));
    env.cmd()
        .args(["--context", "prod", "context", "current"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Namespace: tools"));
}

#[test]
fn test_missing_kubeconfig_fails() {
    let env = Env::new();
    Command::cargo_bin("kubescope")
        .unwrap()
        .env("KUBESCOPE_CONFIG", env.path("config.toml"))
        .args(["--kubeconfig", arg(&env.path("nope.yaml")), "context", "list"])
        .assert()
        .failure();
}

#[test]
fn test_config_commands() {
    let env = Env::new();
    env.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    env.cmd().args(["config", "init"]).assert().success();
    assert!(env.path("config.toml").exists());
    env.cmd().args(["config", "init"]).assert().failure();
    env.cmd().args(["config", "init", "--force"]).assert().success();

    env.cmd()
        .args(["config", "set", "layout.iterations", "40"])
        .assert()
        .success();
    env.cmd()
        .args(["config", "get", "layout.iterations"])
        .assert()
        .success()
        .stdout("40\n");

    env.cmd()
        .args(["config", "set", "layout.iterations", "lots"])
        .assert()
        .failure();
    env.cmd().args(["config", "get", "no.such.key"]).assert().failure();

    env.cmd()
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"layout\.iterations\*\s+40\s+100").unwrap())
        .stdout(predicate::str::is_match(r"layout\.deadline_ms\s+\(not set\)").unwrap());

    let output = env.cmd().args(["config", "list", "-f", "json"]).output().unwrap();
    let values = json_stdout(&output.stdout);
    assert_eq!(values["kubectl"], "kubectl");
    assert!(values["layout.deadline_ms"].is_null());

    env.cmd()
        .args(["config", "reset", "layout.iterations"])
        .assert()
        .success()
        .stdout("layout.iterations reset to 100\n");
}

#[test]
fn test_config_init_records_flags() {
    let env = Env::new();
    env.cmd()
        .args(["-n", "tools", "config", "init"])
        .assert()
        .success();
    env.cmd()
        .args(["config", "get", "default_namespace"])
        .assert()
        .success()
        .stdout("tools\n");
    env.cmd()
        .args(["config", "get", "kubeconfig"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kubeconfig"));
}

#[test]
fn test_invalid_layout_in_file() {
    let env = Env::new();
    env.write("config.toml", "kubectl = \"/opt/kubectl\"\n[layout]\ndamping = 1.5\niterations = 10\n");

    env.cmd()
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("damping"));

    // the rest of the file still applies; the layout section falls back to defaults
    env.cmd()
        .args(["config", "get", "kubectl"])
        .assert()
        .success()
        .stdout("/opt/kubectl\n");
    env.cmd()
        .args(["config", "get", "layout.iterations"])
        .assert()
        .success()
        .stdout("100\n");

    let (pods, services) = write_sample_graph(&env);
    env.cmd()
        .args(["graph", "-i", arg(&pods), "-i", arg(&services)])
        .assert()
        .success();
}

#[test]
fn test_graph_from_files() {
    let env = Env::new();
    let (pods, services) = write_sample_graph(&env);

    let output = env
        .cmd()
        .args(["graph", "-i", arg(&pods), "-i", arg(&services), "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let graph = json_stdout(&output.stdout);
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 2);
    let edge = &graph["edges"][0];
    assert_eq!(edge["type"], "network");
    assert_eq!(edge["source"], "Service/shop/web");
    assert_eq!(edge["target"], "Pod/shop/web-1");
    assert_eq!(edge["label"], "80→8080");
}

#[test]
fn test_graph_from_single_object() {
    let env = Env::new();
    let (pods, _) = write_sample_graph(&env);
    let service = env.write(
        "service.json",
        r#"{"apiVersion": "v1", "kind": "Service",
            "metadata": {"name": "web", "namespace": "shop"},
            "spec": {"selector": {"app": "web"}, "ports": [{"port": 80}]}}"#,
    );

    let output = env
        .cmd()
        .args(["graph", "-i", arg(&pods), "-i", arg(&service), "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let graph = json_stdout(&output.stdout);
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(graph["edges"][0]["source"], "Service/shop/web");
}

#[test]
fn test_graph_table_and_explore() {
    let env = Env::new();
    let (pods, services) = write_sample_graph(&env);

    env.cmd()
        .args(["graph", "-i", arg(&pods), "-i", arg(&services)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Graph: 2 resources, 1 relationships"))
        .stdout(predicate::str::contains("Running"));

    env.cmd()
        .args(["graph", "-i", arg(&pods), "-i", arg(&services), "--explore", "Pod/shop/web-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Neighborhood of Pod/shop/web-1"))
        .stdout(predicate::str::contains("Service/shop/web"));

    env.cmd()
        .args(["graph", "-i", arg(&pods), "--explore", "Pod/shop/ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Resource not found"));
}

#[test]
fn test_graph_input_errors() {
    let env = Env::new();
    env.cmd().arg("graph").assert().failure();

    let unknown = env.write("unknown.json", r#"{"items": []}"#);
    env.cmd()
        .args(["graph", "-i", arg(&unknown)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--kind"));

    env.cmd()
        .args(["graph", "-i", arg(&unknown), "--kind", "pods"])
        .assert()
        .success();
}

#[test]
fn test_serve_stdio_session() {
    let env = Env::new();
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_current_context","arguments":{}}}"#,
        "\n",
        "not json\n",
    );

    let output = env
        .cmd()
        .args(["serve", "--no-kubectl"])
        .write_stdin(input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let lines: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["result"]["serverInfo"]["name"], "kubescope");
    assert_eq!(lines[1]["id"], 2);
    assert!(lines[1]["result"]["content"][0]["text"].as_str().unwrap().contains("\"dev\""));
    assert_eq!(lines[2]["error"]["code"], -32700);
}

#[test]
fn test_completions() {
    Command::cargo_bin("kubescope")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kubescope"));
}
