#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const SETTINGS: &str = "version: 1\ncandidate_models: [modelX]\ntranslation_services: []\n";

const TRANSLATION_MANIFEST: &str = r#"{
  "documents": [
    {
      "name": "approval",
      "translations": [
        {"language": "English", "author": "baseline", "text": "Your benefits were approved."},
        {"language": "Spanish", "author": "baseline", "text": "Sus beneficios fueron aprobados."},
        {"language": "Spanish", "author": "modelX", "text": "Sus beneficios han sido aprobados."}
      ]
    },
    {
      "name": "no_english",
      "translations": [
        {"language": "Spanish", "author": "baseline", "text": "Hola."}
      ]
    }
  ]
}"#;

fn proofread(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("proofread").expect("proofread binary");
    cmd.current_dir(dir)
        .env_remove("PROOFREAD_CONFIG")
        .env_remove("PROOFREAD_PLUGIN_DIR")
        .env("RUST_LOG", "warn");
    cmd
}

fn write_fixtures(dir: &Path) {
    fs::write(dir.join("proofread.yaml"), SETTINGS).unwrap();
    fs::write(dir.join("manifest.json"), TRANSLATION_MANIFEST).unwrap();
}

#[test]
fn evaluate_rouge_prints_scored_scenarios() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());

    let output = proofread(dir.path())
        .args([
            "--config",
            "proofread.yaml",
            "evaluate",
            "manifest.json",
            "--experiments",
            "rouge_experiment",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let scenarios: Value = serde_json::from_slice(&output).expect("stdout is JSON");
    let scenarios = scenarios.as_array().expect("scenario list");
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0]["name"], "modelx_spanish");
    assert_eq!(scenarios[0]["document"], "approval");
    let results = scenarios[0]["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["metric_name"], "rouge_experiment:modelx_spanish");
    assert!(results[0]["score"].as_f64().unwrap() > 0.0);
}

#[test]
fn unknown_experiment_is_a_config_error() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());

    proofread(dir.path())
        .args([
            "--config",
            "proofread.yaml",
            "evaluate",
            "manifest.json",
            "--experiments",
            "rouge_experiment,bleu",
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("unknown experiment(s) bleu"));
}

#[test]
fn missing_manifest_is_a_config_error() {
    let dir = tempdir().unwrap();
    proofread(dir.path())
        .args(["evaluate", "nope.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("manifest not found"));
}

#[test]
fn translate_rejects_experiment_selection() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());
    proofread(dir.path())
        .args(["translate", "manifest.json", "--experiments", "rouge_experiment"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid argument"));
}

#[test]
fn translate_rejects_unknown_translation_service() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());
    fs::write(
        dir.path().join("services.yaml"),
        "version: 1\ncandidate_models: [modelX]\ntranslation_services: [deepl]\n",
    )
    .unwrap();
    proofread(dir.path())
        .args(["--config", "services.yaml", "translate", "manifest.json"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("unknown translation service 'deepl'"));
}

#[test]
fn unwritable_output_is_an_infrastructure_error() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());
    fs::write(dir.path().join("blocker"), "file, not a directory").unwrap();
    proofread(dir.path())
        .args([
            "--config",
            "proofread.yaml",
            "evaluate",
            "manifest.json",
            "--experiments",
            "rouge_experiment",
            "--output",
            "blocker/out.json",
        ])
        .assert()
        .code(3);
}

#[test]
fn experiments_lists_builtins_and_plugin_errors() {
    let dir = tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    fs::create_dir(&plugins).unwrap();
    fs::write(
        plugins.join("a_extra.yaml"),
        "experiments:\n  - kind: rouge\n    name: rouge_again\n",
    )
    .unwrap();
    fs::write(plugins.join("b_bad.yaml"), "experiments: [").unwrap();

    let output = proofread(dir.path())
        .args(["experiments", "--plugin-dir", "plugins", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listing: Value = serde_json::from_slice(&output).unwrap();
    let names: Vec<&str> = listing["experiments"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["name"].as_str())
        .collect();
    assert!(names.contains(&"rouge_experiment"));
    assert!(names.contains(&"rouge_again"));
    assert_eq!(listing["load_errors"].as_array().unwrap().len(), 1);
}

#[test]
fn summarize_writes_one_row_per_result() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("evaluated.json"),
        r#"[{
          "path": "notices/approval.pdf",
          "text": "Approved.",
          "notice_analysis": [{
            "summary": "Approved",
            "questions": [],
            "llm_model_name": "aya-expanse:8b",
            "prompt_name": "prompt_1",
            "evaluation_results": [
              {"metric_name": "faithfulness", "score": 0.5, "related_analysis": "summary"},
              {"metric_name": "hallucination", "score": null, "reason": "judge failed"}
            ]
          }]
        }]"#,
    )
    .unwrap();

    proofread(dir.path())
        .args(["summarize", "evaluated.json", "--output", "rows.jsonl"])
        .assert()
        .success();

    let rows = fs::read_to_string(dir.path().join("rows.jsonl")).unwrap();
    let rows: Vec<Value> = rows
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["document"], "approval.pdf");
    assert_eq!(rows[0]["positive"], 1.0);
    assert_eq!(rows[1]["negative"], 1.0);
    assert!(rows[1]["score"].is_null());
}
