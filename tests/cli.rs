use assert_cmd::Command;
use tempfile::tempdir;

#[test]
fn run_prints_final_context() {
    let output = Command::cargo_bin("pipetree")
        .expect("binary present")
        .args(["run", "recipes/create.yaml"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let context: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(context["operation"], "Create");
    assert_eq!(context["version"], 1);
}

#[test]
fn halted_run_exits_with_failure_and_partial_context() {
    let temp = tempdir().unwrap();
    let metrics = temp.path().join("metrics/run.prom");

    let output = Command::cargo_bin("pipetree")
        .expect("binary present")
        .args(["run", "recipes/halting.yaml", "--metrics-prometheus"])
        .arg(&metrics)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let context: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(context, serde_json::json!({"a": 1}));

    let prom = std::fs::read_to_string(&metrics).unwrap();
    assert!(prom.contains("pipetree_step_halts_total{step=\"halt\"} 1"));
}

#[test]
fn context_file_overrides_recipe_context() {
    let temp = tempdir().unwrap();
    let context_path = temp.path().join("ctx.json");
    std::fs::write(&context_path, r#"{"params": null}"#).unwrap();

    Command::cargo_bin("pipetree")
        .expect("binary present")
        .args(["run", "recipes/base.yaml", "--context"])
        .arg(&context_path)
        .assert()
        .failure();
}

#[test]
fn inspect_lists_steps_in_order() {
    let output = Command::cargo_bin("pipetree")
        .expect("binary present")
        .args(["inspect", "recipes/base.yaml"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("[>>operation.new,&require.params,>persist]"));
}
