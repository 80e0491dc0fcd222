use agent_operator::config::{OperatorConfig, StoreBackend};
use agent_operator::tooling::{CliContext, Commands};
use tempfile::TempDir;

const MANIFESTS: &str = r#"
kind: Package
metadata:
  name: toolbox
  namespace: team-a
spec:
  modules:
    translate:
      description: Translates text
      sourceSchema: '{"type":"string"}'
---
kind: Function
metadata:
  name: translate
  namespace: team-a
spec:
  package: toolbox
  module: translate
  requestSource:
    pulsar:
      topic: translate-requests
---
kind: Agent
metadata:
  name: polyglot
  namespace: team-a
spec:
  instruction: Translate everything
  tools:
    - name: translate
"#;

fn sled_context(temp: &TempDir) -> CliContext {
    let mut config = OperatorConfig::default();
    config.store.backend = StoreBackend::Sled;
    config.store.path = Some(temp.path().join("store"));
    CliContext::new(config).unwrap()
}

fn reconcile(ctx: &CliContext, manifests: &TempDir, format: &str) -> String {
    ctx.execute(&Commands::Reconcile {
        manifests: manifests.path().to_path_buf(),
        format: format.to_string(),
    })
    .unwrap()
}

#[test]
fn reconcile_prints_derived_functions_as_yaml() {
    let manifests = TempDir::new().unwrap();
    std::fs::write(manifests.path().join("team.yaml"), MANIFESTS).unwrap();
    let ctx = CliContext::new(OperatorConfig::default()).unwrap();

    let output = reconcile(&ctx, &manifests, "yaml");
    let report: serde_yaml::Value = serde_yaml::from_str(&output).unwrap();

    let functions = report["functions"].as_sequence().unwrap();
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0]["metadata"]["namespace"].as_str(), Some("team-a"));
    assert_eq!(functions[0]["metadata"]["labels"]["agent"].as_str(), Some("polyglot"));
    let tool = &functions[0]["spec"]["config"]["agent"]["tools"]["translate"];
    assert_eq!(tool["requestSource"].as_str(), Some("translate-requests"));
    assert_eq!(tool["sourceSchema"].as_str(), Some(r#"{"type":"string"}"#));
    assert!(report.get("failures").is_none());
}

#[test]
fn package_outside_the_tool_namespace_is_reported_as_a_failure() {
    let manifests = TempDir::new().unwrap();
    // Without a namespace the package lands in "default", out of the tool's reach.
    let misplaced = MANIFESTS.replacen("  namespace: team-a\n", "", 1);
    std::fs::write(manifests.path().join("team.yaml"), misplaced).unwrap();
    let ctx = CliContext::new(OperatorConfig::default()).unwrap();

    let output = reconcile(&ctx, &manifests, "json");
    let report: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(report["functions"].as_array().unwrap().len(), 0);
    let failures = report["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["agent"], "team-a/polyglot");
    assert_eq!(failures[0]["reason"], "ToolResolutionFailed");
    assert!(failures[0]["error"]
        .as_str()
        .unwrap()
        .contains("failed to get package toolbox"));
}

#[test]
fn status_json_reflects_state_across_invocations() {
    let manifests = TempDir::new().unwrap();
    std::fs::write(manifests.path().join("team.yaml"), MANIFESTS).unwrap();
    let store = TempDir::new().unwrap();

    {
        let ctx = sled_context(&store);
        reconcile(&ctx, &manifests, "json");
    }

    let ctx = sled_context(&store);
    let output = ctx
        .execute(&Commands::Status {
            format: "json".to_string(),
            namespace: Some("team-a".to_string()),
        })
        .unwrap();
    let entries: serde_json::Value = serde_json::from_str(&output).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["agent"], "polyglot");
    assert_eq!(entries[0]["tools"], 1);
    assert_eq!(entries[0]["function"], true);
    assert_eq!(entries[0]["ready_replicas"], 0);
}
