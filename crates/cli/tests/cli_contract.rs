use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;

fn run_json(store: &Path, args: &[&str]) -> Value {
    let output = cargo_bin_cmd!("takeoff")
        .arg("--store")
        .arg(store)
        .args(args)
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

fn calibrate(store: &Path) -> Value {
    run_json(
        store,
        &[
            "calibrate", "--plan", "plan-a", "--page", "1", "--from", "0,0", "--to", "100,0",
            "--distance", "10", "--unit", "ft",
        ],
    )
}

#[test]
fn calibrate_emits_pixels_per_unit() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let value = calibrate(temp.path());

    assert_eq!(value["pixels_per_unit"], 10.0);
    assert_eq!(value["real_unit"], "ft");
    assert_eq!(value["scope"]["plan_id"], "plan-a");
    assert!(temp.path().join("takeoff.json").exists());
}

#[test]
fn rectangle_is_measured_and_priced() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    calibrate(temp.path());

    let value = run_json(
        temp.path(),
        &[
            "measure", "--plan", "plan-a", "--kind", "rectangle", "--point", "0,0", "--point",
            "20,30", "--unit-price", "5", "--label", "Slab",
        ],
    );

    assert_eq!(value["kind"], "rectangle");
    assert_eq!(value["unit"], "ft²");
    assert_eq!(value["label"], "Slab");
    let area = value["value"].as_f64().expect("value should be a number");
    let total = value["total_price"].as_f64().expect("total should be a number");
    assert!((area - 6.0).abs() < 1e-9);
    assert!((total - 30.0).abs() < 1e-9);
}

#[test]
fn line_requires_calibration() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("takeoff")
        .arg("--store")
        .arg(temp.path())
        .args([
            "measure", "--plan", "plan-a", "--kind", "line", "--point", "0,0", "--point", "50,0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no calibration"));
}

#[test]
fn count_needs_no_calibration() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    let value = run_json(
        temp.path(),
        &[
            "measure", "--plan", "plan-a", "--kind", "count", "--point", "1,1", "--point", "5,5",
            "--point", "9,9", "--unit-price", "2.5",
        ],
    );

    assert_eq!(value["value"], 3.0);
    assert_eq!(value["unit"], "unité");
    assert_eq!(value["total_price"], 7.5);
    assert_eq!(value["points"].as_array().map(Vec::len), Some(3));
}

#[test]
fn polygon_with_two_points_is_rejected() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    calibrate(temp.path());

    cargo_bin_cmd!("takeoff")
        .arg("--store")
        .arg(temp.path())
        .args([
            "measure", "--plan", "plan-a", "--kind", "polygon", "--point", "0,0", "--point", "10,0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("needs at least 3 points"));

    let listed = run_json(temp.path(), &["list"]);
    assert_eq!(listed["measures"].as_array().map(Vec::len), Some(0));
}

#[test]
fn list_filters_by_plan_and_delete_removes() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let first = run_json(
        temp.path(),
        &["measure", "--plan", "plan-a", "--kind", "count", "--point", "1,1", "--unit-price", "4"],
    );
    run_json(temp.path(), &["measure", "--plan", "plan-b", "--kind", "count", "--point", "2,2"]);

    let all = run_json(temp.path(), &["list"]);
    assert_eq!(all["measures"].as_array().map(Vec::len), Some(2));

    let plan_a = run_json(temp.path(), &["list", "--plan", "plan-a"]);
    assert_eq!(plan_a["measures"].as_array().map(Vec::len), Some(1));
    assert_eq!(plan_a["total_price"], 4.0);

    let id = first["id"].as_str().expect("id should be a string");
    let deleted = run_json(temp.path(), &["delete", id]);
    assert_eq!(deleted["deleted"], id);

    let plan_a = run_json(temp.path(), &["list", "--plan", "plan-a"]);
    assert_eq!(plan_a["measures"].as_array().map(Vec::len), Some(0));
}

#[test]
fn delete_unknown_measure_fails() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("takeoff")
        .arg("--store")
        .arg(temp.path())
        .args(["delete", "6f1c1f0e-4b7a-4d55-9b8e-0a7c2a1d9e11"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("measure not found"));
}

#[test]
fn overlay_scales_to_zoom() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    calibrate(temp.path());
    run_json(
        temp.path(),
        &[
            "measure", "--plan", "plan-a", "--kind", "rectangle", "--point", "0,0", "--point",
            "20,30",
        ],
    );

    let value = run_json(temp.path(), &["overlay", "--plan", "plan-a", "--zoom", "200"]);
    assert_eq!(value["zoom_percent"], 200.0);

    let instructions = value["instructions"].as_array().expect("instructions should be an array");
    assert_eq!(instructions[0]["type"], "rectangle");
    assert_eq!(instructions[0]["max"]["x"], 40.0);
    assert_eq!(instructions[0]["max"]["y"], 60.0);
    assert_eq!(instructions[1]["type"], "label");
    assert_eq!(instructions[1]["text"], "6.00 ft²");
}

#[test]
fn overlay_rejects_zero_zoom() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("takeoff")
        .arg("--store")
        .arg(temp.path())
        .args(["overlay", "--plan", "plan-a", "--zoom", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --zoom"));
}

#[test]
fn calibrate_rejects_non_positive_distance() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("takeoff")
        .arg("--store")
        .arg(temp.path())
        .args([
            "calibrate", "--plan", "plan-a", "--from", "0,0", "--to", "100,0", "--distance", "0",
            "--unit", "ft",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("real distance must be positive"));
}

#[test]
fn invalid_point_is_a_usage_error() {
    cargo_bin_cmd!("takeoff")
        .args(["measure", "--plan", "plan-a", "--kind", "count", "--point", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected X,Y"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("takeoff")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
