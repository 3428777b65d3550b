//! CLI command integration tests.
//! Each test writes its container into a fresh temp directory.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PLOT: &str = r#"@capsule
/// Draws a titled plot.
fn plot(container, title, xlabel) {
    title + " vs " + xlabel
}
"#;

fn capsula_cmd(dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("capsula").unwrap();
    cmd.env("CAPSULA_CONTAINER", dir.path().join("capsules.db"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_script(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn attach_plot(dir: &TempDir) {
    let script = write_script(dir, "plot.rhai", PLOT);
    capsula_cmd(dir)
        .arg("attach")
        .arg(&script)
        .args(["--arg", "\"Voltage\"", "--kwarg", "xlabel=\"time\""])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved plot: plot(container, title, xlabel = \"time\")"));
}

#[test]
fn attach_then_run_with_defaults() {
    let dir = TempDir::new().unwrap();
    attach_plot(&dir);

    capsula_cmd(&dir)
        .args(["run", "plot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Voltage vs time\""));
}

#[test]
fn run_with_keyword_override() {
    let dir = TempDir::new().unwrap();
    attach_plot(&dir);

    capsula_cmd(&dir)
        .args(["run", "plot", "--kwarg", "xlabel=distance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Voltage vs distance"));
}

#[test]
fn run_rejects_positional_without_flag() {
    let dir = TempDir::new().unwrap();
    attach_plot(&dir);

    capsula_cmd(&dir)
        .args(["run", "plot", "--arg", "\"Current\""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("positional"));

    capsula_cmd(&dir)
        .args(["run", "plot", "--arg", "\"Current\"", "--replace-args"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current vs time"));
}

#[test]
fn list_and_show() {
    let dir = TempDir::new().unwrap();
    attach_plot(&dir);

    capsula_cmd(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("plot: plot(container, title, xlabel = \"time\")"))
        .stdout(predicate::str::contains("    Draws a titled plot."));

    capsula_cmd(&dir)
        .args(["show", "plot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fn plot(container, title, xlabel)"))
        .stdout(predicate::str::contains("@capsule").not());
}

#[test]
fn run_missing_slot_fails() {
    let dir = TempDir::new().unwrap();
    attach_plot(&dir);

    capsula_cmd(&dir)
        .args(["run", "plot_v2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("plot_v2"));
}

#[test]
fn missing_container_flag_fails() {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("capsula").unwrap();
    cmd.env_remove("CAPSULA_CONTAINER")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CAPSULA_CONTAINER"));
}

#[test]
fn data_add_list_and_read_from_capsule() {
    let dir = TempDir::new().unwrap();

    capsula_cmd(&dir)
        .args([
            "data",
            "add",
            "simulations/ExampleData",
            "--doc",
            "example data",
            "--item",
            "x=[1, 2, 6]",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved 1 series"));

    capsula_cmd(&dir)
        .args(["data", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("simulations/ExampleData: x"))
        .stdout(predicate::str::contains("example data"));

    let script = write_script(
        &dir,
        "total.rhai",
        r#"fn total(container, group, slot) {
    import "container" as store;
    let sum = 0.0;
    for v in store::get_data(container, group, slot) {
        sum += v;
    }
    sum
}
"#,
    );
    capsula_cmd(&dir)
        .arg("attach")
        .arg(&script)
        .args(["--arg", "\"simulations/ExampleData\"", "--arg", "\"x\""])
        .assert()
        .success();

    capsula_cmd(&dir)
        .args(["run", "total"])
        .assert()
        .success()
        .stdout(predicate::str::contains("9.0"));
}
