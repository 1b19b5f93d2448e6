use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use serde_json::{Value, json};

const CONFIG: &str = r#"{
  "groups": [{
    "id": "g1",
    "questions": [
      {
        "id": "q1",
        "type": "choice",
        "validators": ["required"],
        "choices": [
          { "id": "c1", "onSelected": { "enable": ["q2"] } },
          { "id": "c2" }
        ]
      },
      { "id": "q2", "type": "any", "defaultDisabled": true, "validators": ["required"] }
    ]
  }]
}"#;

fn form_engine() -> Command {
    Command::cargo_bin("form-engine").expect("binary")
}

fn workspace() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    dir.child("config.json").write_str(CONFIG).expect("config");
    dir
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("json output")
}

#[test]
fn check_reports_valid_config() {
    let dir = workspace();
    let output = form_engine()
        .arg("check")
        .arg("--config")
        .arg(dir.child("config.json").path())
        .assert()
        .success()
        .get_output()
        .clone();

    assert_eq!(stdout_json(&output), json!({ "valid": true }));
}

#[test]
fn check_fails_on_invalid_config() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.child("config.json");
    config
        .write_str(r#"{ "questions": [{ "id": "q", "type": "choice" }] }"#)
        .expect("config");

    let output = form_engine()
        .arg("check")
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .get_output()
        .clone();

    let report = stdout_json(&output);
    assert_eq!(report["valid"], json!(false));
    assert_eq!(report["errors"]["q"], json!(["There are no choices"]));
}

#[test]
fn strict_check_rejects_unknown_targets() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.child("config.json");
    config
        .write_str(
            r#"{ "questions": [{ "id": "q", "type": "choice", "choices": [{ "id": "c", "onSelected": { "disable": ["ghost"] } }] }] }"#,
        )
        .expect("config");

    form_engine()
        .arg("check")
        .arg("--config")
        .arg(config.path())
        .assert()
        .success();

    let output = form_engine()
        .arg("check")
        .arg("--config")
        .arg(config.path())
        .arg("--strict")
        .assert()
        .failure()
        .get_output()
        .clone();
    assert_eq!(
        stdout_json(&output)["errors"]["c"],
        json!(["There are unrecognized id(s) in onSelected configs"])
    );
}

#[test]
fn render_prints_text_snapshot() {
    let dir = workspace();
    dir.child("answers.json")
        .write_str(r#"{ "q1": "c1" }"#)
        .expect("answers");

    let output = form_engine()
        .arg("render")
        .arg("--config")
        .arg(dir.child("config.json").path())
        .arg("--answers")
        .arg(dir.child("answers.json").path())
        .assert()
        .success()
        .get_output()
        .clone();

    let text = String::from_utf8(output.stdout).expect("utf8");
    assert!(text.contains("Group g1"));
    assert!(text.contains("[x] c1 = c1"));
    assert!(text.contains("! This field is required."));
}

#[test]
fn render_prints_json_snapshot() {
    let dir = workspace();
    let output = form_engine()
        .arg("render")
        .arg("--config")
        .arg(dir.child("config.json").path())
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .get_output()
        .clone();

    let snapshot = stdout_json(&output);
    let questions = &snapshot["groups"][0]["questions"];
    assert_eq!(questions[0]["id"], json!("q1"));
    assert_eq!(questions[0]["type"], json!("choice"));
    assert_eq!(questions[1]["disabled"], json!(true));
    assert_eq!(questions[0]["choices"][0]["selected"], json!(false));
}

#[test]
fn answers_exports_validated_answers() {
    let dir = workspace();
    dir.child("answers.json")
        .write_str(r#"{ "q1": "c1", "q2": "hello" }"#)
        .expect("answers");

    let output = form_engine()
        .arg("answers")
        .arg("--config")
        .arg(dir.child("config.json").path())
        .arg("--answers")
        .arg(dir.child("answers.json").path())
        .assert()
        .success()
        .get_output()
        .clone();

    assert_eq!(
        stdout_json(&output),
        json!({
            "current": { "q1": "c1", "q2": "hello" },
            "validated": { "q1": "c1", "q2": "hello" },
            "errors": {},
            "clean": true
        })
    );
}

#[test]
fn schema_describes_form_config() {
    let output = form_engine()
        .arg("schema")
        .assert()
        .success()
        .get_output()
        .clone();

    let schema = stdout_json(&output);
    assert_eq!(schema["title"], json!("FormConfig"));
    assert!(schema["properties"]["groups"].is_object());
}
