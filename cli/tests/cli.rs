use assert_cmd::Command;
use httpmock::prelude::*;
use serde_json::json;
use std::path::Path;

fn rancher2(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rancher2").unwrap();
    cmd.current_dir(dir)
        .env_remove("RANCHER_URL")
        .env_remove("RANCHER_ACCESS_KEY")
        .env_remove("RANCHER_SECRET_KEY")
        .env_remove("RANCHER_TOKEN_KEY")
        .env_remove("RANCHER_CLIENT_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

const STATE: &str = r#"{
  "version": 1,
  "serial": 3,
  "resources": {
    "rancher2_project.web": {
      "type": "rancher2_project",
      "name": "web",
      "id": "c-abc:p-web",
      "attributes": {"id": "c-abc:p-web", "cluster_id": "c-abc", "name": "web"}
    }
  }
}"#;

#[test]
fn types_lists_resources_and_data_sources() {
    let dir = tempfile::tempdir().unwrap();
    let output = rancher2(dir.path()).arg("types").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("resource rancher2_namespace"));
    assert!(stdout.contains("resource rancher2_bootstrap"));
    assert!(stdout.contains("data     rancher2_setting"));
}

#[test]
fn schema_of_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let output = rancher2(dir.path())
        .args(&["schema", "rancher2_namespace"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(schema["properties"]["project_id"].is_object());

    rancher2(dir.path())
        .args(&["schema", "rancher2_nope"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn state_list_show_rm() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rancher2.state.json"), STATE).unwrap();

    let output = rancher2(dir.path()).args(&["state", "list"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("rancher2_project.web"));
    assert!(stdout.contains("c-abc:p-web"));

    let output = rancher2(dir.path())
        .args(&["state", "show", "rancher2_project.web"])
        .output()
        .unwrap();
    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["attributes"]["cluster_id"], "c-abc");

    rancher2(dir.path())
        .args(&["state", "rm", "rancher2_project.web"])
        .assert()
        .success();
    let saved: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("rancher2.state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(saved["serial"], 4);
    assert_eq!(saved["resources"], json!({}));

    rancher2(dir.path())
        .args(&["state", "rm", "rancher2_project.web"])
        .assert()
        .failure();
}

#[test]
fn missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let output = rancher2(dir.path())
        .args(&["--api-url", "https://rancher.example.com", "plan", "-f", "nope.yaml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Unable to load manifest 'nope.yaml'"));
}

#[test]
fn plan_against_server() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v3");
        then.status(200).json_body(json!({"type": "collection"}));
    });
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("rancher2.yaml"),
        format!(
            r#"
provider:
  api_url: {}
  token_key: token-abc:xyz
resources:
  - type: rancher2_project
    name: web
    config:
      cluster_id: c-abc
      name: web
"#,
            server.base_url()
        ),
    )
    .unwrap();

    let output = rancher2(dir.path())
        .args(&["plan", "-f", "rancher2.yaml"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("rancher2_project.web"));
    assert!(stdout.contains("Plan: 1 to create, 0 to update, 0 to replace, 0 to delete."));

    let output = rancher2(dir.path())
        .args(&["plan", "-f", "rancher2.yaml", "--json"])
        .output()
        .unwrap();
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["changes"][0]["action"], "create");
}
