use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const TRANSCRIPT: &str =
    "First claim here. Second claim here. Third claim here. Fourth claim here.";

#[allow(deprecated)]
fn reasonscan() -> Command {
    let mut cmd = Command::cargo_bin("reasonscan").expect("binary");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn payload(name: &str, score: u8) -> Value {
    json!({
        "schema_version": 1,
        "fallacies": [{ "name": name, "rationale": format!("{name} in this section"), "severity": "Medium" }],
        "biases": [],
        "argument_map": [{ "claim": "the plan will work", "is_assumption": false }],
        "rationality": { "overall_score": score }
    })
}

/// A transcript that splits into four chunks at 20 chars, plus payloads
/// for the given chunk indices
fn setup(payload_indices: &[usize]) -> TempDir {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("panel.txt"), TRANSCRIPT).expect("write transcript");
    fs::create_dir_all(root.join("payloads")).expect("payload dir");
    for &idx in payload_indices {
        let name = if idx % 2 == 0 { "Straw Man" } else { "strawman" };
        fs::write(
            root.join("payloads").join(format!("chunk-{idx:04}.json")),
            payload(name, 4).to_string(),
        )
        .expect("write payload");
    }
    temp
}

fn analyze_json(root: &Path, extra: &[&str]) -> (bool, Value) {
    let output = reasonscan()
        .current_dir(root)
        .args(["analyze", "panel.txt", "--payload-dir", "payloads"])
        .args(["--max-chars", "20", "--format", "json"])
        .args(["--concurrency", "2"])
        .args(extra)
        .output()
        .expect("command run");
    let body = if output.stdout.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&output.stdout).expect("valid json")
    };
    (output.status.success(), body)
}

#[test]
fn chunk_json_reports_offsets() {
    let temp = setup(&[]);
    let output = reasonscan()
        .current_dir(temp.path())
        .args(["chunk", "panel.txt", "--max-chars", "20", "--json"])
        .output()
        .expect("command run");
    assert!(output.status.success());

    let plan: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let chunks = plan["chunks"].as_array().expect("chunks");
    assert_eq!(chunks.len(), 4);
    assert_eq!(plan["id"], "panel");
    assert_eq!(plan["bound"], json!({ "chars": 20 }));

    let rebuilt: String = chunks
        .iter()
        .map(|c| c["text"].as_str().expect("text"))
        .collect();
    assert_eq!(rebuilt, TRANSCRIPT);
    assert_eq!(chunks[1]["start_offset"], chunks[0]["end_offset"]);
}

#[test]
fn chunk_reads_stdin() {
    reasonscan()
        .args(["chunk", "-", "--max-chars", "40"])
        .write_stdin(TRANSCRIPT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Section 1 of 2"))
        .stdout(predicate::str::contains("Section 2 of 2"));
}

#[test]
fn validate_prints_normalized_annotations() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("payload.json");
    fs::write(
        &path,
        json!({
            "fallacies": [
                { "name": "Ad Hominem", "rationale": "attacks the speaker", "severity": "high" },
                { "rationale": "no name" }
            ]
        })
        .to_string(),
    )
    .expect("write");

    let output = reasonscan()
        .args(["validate", "--chunk-index", "5"])
        .arg(&path)
        .output()
        .expect("command run");
    assert!(output.status.success());

    let set: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(set["chunk_index"], 5);
    assert_eq!(set["annotations"].as_array().expect("annotations").len(), 1);
    assert_eq!(set["annotations"][0]["severity"], "High");
    // skipped entry plus the missing rating
    assert_eq!(set["warnings"].as_array().expect("warnings").len(), 2);
    assert!(set["rating"].is_null());
}

#[test]
fn validate_rejects_schema_mismatch() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("payload.json");
    fs::write(&path, r#"{"schema_version": 99}"#).expect("write");

    reasonscan()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Schema version mismatch"));
}

#[test]
fn analyze_json_aggregates_all_chunks() {
    let temp = setup(&[0, 1, 2, 3]);
    let (ok, report) = analyze_json(temp.path(), &[]);
    assert!(ok, "report: {report}");

    assert_eq!(report["coverage"]["total_chunks"], 4);
    assert_eq!(report["coverage"]["incomplete_coverage"], false);
    assert_eq!(report["rationality"]["overall_score"], 4);
    assert_eq!(report["source"]["label"], "panel.txt");

    let rows = report["taxonomy"].as_array().expect("taxonomy");
    let detected: Vec<&Value> = rows.iter().filter(|r| r["status"] == "detected").collect();
    assert_eq!(detected.len(), 1);
    assert_eq!(detected[0]["canonical_type_name"], "Straw Man");
    assert_eq!(detected[0]["chunk_count"], 4);
    assert_eq!(detected[0]["frequency"], "High");
    assert!(rows
        .iter()
        .any(|r| r["status"] == "none_detected" && r["domain"] == "B"));
}

#[test]
fn missing_payload_degrades_one_chunk() {
    let temp = setup(&[0, 1, 3]);
    let (ok, report) = analyze_json(temp.path(), &[]);
    assert!(ok, "report: {report}");

    assert_eq!(report["coverage"]["degraded_indices"], json!([2]));
    assert_eq!(report["coverage"]["incomplete_coverage"], true);
    assert_eq!(report["chunks"][2]["status"], "degraded");
    assert_eq!(report["rationality"]["rated_chunks"], 3);
}

#[test]
fn markdown_report_written_to_file() {
    let temp = setup(&[0, 1, 3]);
    reasonscan()
        .current_dir(temp.path())
        .args(["analyze", "panel.txt", "--payload-dir", "payloads"])
        .args(["--max-chars", "20", "--title", "Panel Debate"])
        .args(["--output", "out/report.md"])
        .assert()
        .success();

    let md = fs::read_to_string(temp.path().join("out/report.md")).expect("report");
    assert!(md.contains("# Reasoning report: Panel Debate"));
    assert!(md.contains("**Incomplete coverage:** chunks 2"));
    assert!(md.contains("| Straw Man | `3` |"));
    assert!(md.contains("### Section 3 of 4"));
}

#[test]
fn summary_only_omits_chunk_details() {
    let temp = setup(&[0, 1, 2, 3]);
    reasonscan()
        .current_dir(temp.path())
        .args(["analyze", "panel.txt", "--payload-dir", "payloads"])
        .args(["--max-chars", "20", "--summary-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## Rationality profile"))
        .stdout(predicate::str::contains("## Chunks").not());
}

#[test]
fn schema_mismatch_fails_the_run() {
    let temp = setup(&[0, 2, 3]);
    fs::write(
        temp.path().join("payloads/chunk-0001.json"),
        r#"{"schema_version": 2}"#,
    )
    .expect("write");
    let (ok, _) = analyze_json(temp.path(), &[]);
    assert!(!ok);
}

#[test]
fn invalid_config_is_rejected() {
    let temp = setup(&[0, 1, 2, 3]);
    fs::write(
        temp.path().join("reasonscan.toml"),
        "[rating.method]\nkind = \"trimmed_mean\"\ntrim_fraction = 0.7\n",
    )
    .expect("write");
    reasonscan()
        .current_dir(temp.path())
        .args(["analyze", "panel.txt", "--payload-dir", "payloads"])
        .args(["--config", "reasonscan.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rating"));
}

#[test]
fn analyzer_source_is_required() {
    let temp = setup(&[]);
    reasonscan()
        .current_dir(temp.path())
        .args(["analyze", "panel.txt"])
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn analyzer_command_runs_per_chunk() {
    let temp = setup(&[]);
    fs::write(
        temp.path().join("payload.json"),
        payload("Red Herring", 2).to_string(),
    )
    .expect("write");

    let output = reasonscan()
        .current_dir(temp.path())
        .args(["analyze", "panel.txt", "--analyzer-cmd", "cat payload.json"])
        .args(["--max-chars", "20", "--format", "json"])
        .output()
        .expect("command run");
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(report["coverage"]["analyzed_chunks"], 4);
    assert_eq!(report["rationality"]["overall_score"], 2);
}
