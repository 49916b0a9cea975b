//! CLI integration tests for Kiln.
//!
//! These tests drive the `kiln` binary against build descriptions written
//! into temporary project directories.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the kiln binary command.
fn kiln() -> Command {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.env_remove("KILN_FILE").env_remove("KILN_LOG");
    cmd
}

/// Create a project directory holding `manifest` as its Kiln.toml.
fn project(manifest: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("Kiln.toml"), manifest).unwrap();
    tmp
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

const GAME: &str = r#"
default = "all"

[templates.csc]
srcdir = "src"
bindir = "bin"
libs = ["System.dll"]

[templates.game]
extends = "csc"
libs = ["PrimusGE.dll"]

[targets.all]
description = "Build the game"
depends = ["content", "libs", "compile"]

[targets.content]
template = "game"
steps = [{ copy = { from = "${srcdir}", to = "${bindir}", pattern = "*.hlsl" } }]

[targets.libs]
template = "game"
depends = ["vendor_compile"]
steps = [{ copy = { from = "vendor/bin", to = "${bindir}", pattern = "*.dll" } }]

[targets.compile]
template = "game"

[targets.vendor_compile]
before = "compile"

[targets.clean]

[targets.vendor_clean]
after = "clean"
"#;

// ============================================================================
// running targets
// ============================================================================

#[test]
fn test_runs_default_target() {
    let tmp = project(GAME);
    write(tmp.path(), "src/shaders/basic.hlsl", "");
    write(tmp.path(), "src/main.cs", "");
    write(tmp.path(), "vendor/bin/PrimusGE.dll", "");

    kiln()
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Running content"))
        .stderr(predicate::str::contains("Finished 5 target(s)"));

    assert!(tmp.path().join("bin/shaders/basic.hlsl").exists());
    assert!(tmp.path().join("bin/PrimusGE.dll").exists());
    assert!(!tmp.path().join("bin/main.cs").exists());
}

#[test]
fn test_runs_from_subdirectory() {
    let tmp = project(GAME);
    write(tmp.path(), "src/shaders/basic.hlsl", "");

    kiln()
        .arg("content")
        .current_dir(tmp.path().join("src"))
        .assert()
        .success();

    assert!(tmp.path().join("bin/shaders/basic.hlsl").exists());
}

#[test]
fn test_explicit_file_flag() {
    let tmp = project(GAME);
    let elsewhere = TempDir::new().unwrap();

    kiln()
        .args(["--plan", "-f"])
        .arg(tmp.path().join("Kiln.toml"))
        .arg("clean")
        .current_dir(elsewhere.path())
        .assert()
        .success()
        .stdout("clean\nvendor_clean (after clean)\n");
}

#[test]
fn test_quiet_hides_status() {
    let tmp = project(GAME);

    kiln()
        .args(["-q", "clean"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

// ============================================================================
// introspection
// ============================================================================

#[test]
fn test_plan_orders_hooks_and_dependencies() {
    let tmp = project(GAME);

    kiln()
        .arg("--plan")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("content\nvendor_compile\nlibs\ncompile\nall\n");

    // Nothing ran.
    assert!(!tmp.path().join("bin").exists());
}

#[test]
fn test_list_targets() {
    let tmp = project(GAME);

    kiln()
        .arg("--list")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("all (default) - Build the game"))
        .stdout(predicate::str::contains("vendor_compile (before `compile`)"))
        .stdout(predicate::str::contains("compile\n    required by: all\n"))
        .stdout(predicate::str::contains("after hooks: vendor_clean"));
}

#[test]
fn test_graph_is_dot() {
    let tmp = project(GAME);

    kiln()
        .arg("--graph")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph"))
        .stdout(predicate::str::contains("vendor_clean"));
}

// ============================================================================
// failures
// ============================================================================

#[test]
fn test_missing_manifest() {
    let tmp = TempDir::new().unwrap();

    kiln()
        .current_dir(tmp.path())
        .assert()
        .code(8)
        .stderr(predicate::str::contains("could not find `Kiln.toml`"));
}

#[test]
fn test_no_default_target() {
    let tmp = project("[targets.build]\n");

    kiln()
        .current_dir(tmp.path())
        .assert()
        .code(5)
        .stderr(predicate::str::contains("no target specified"));
}

#[test]
fn test_unknown_target_suggests_list() {
    let tmp = project(GAME);

    kiln()
        .arg("deploy")
        .current_dir(tmp.path())
        .assert()
        .code(5)
        .stderr(predicate::str::contains("unknown target `deploy`"))
        .stderr(predicate::str::contains("kiln --list"));
}

#[test]
fn test_cycle_reports_path() {
    let tmp = project(
        r#"
[targets.a]
depends = ["b"]

[targets.b]
depends = ["c"]

[targets.c]
depends = ["a"]
"#,
    );

    kiln()
        .arg("a")
        .current_dir(tmp.path())
        .assert()
        .code(4)
        .stderr(predicate::str::contains("a -> b -> c -> a"));
}

#[test]
fn test_unknown_dependency_fails_before_running() {
    let tmp = project(
        r#"
[targets.first]
steps = [{ copy = { from = "src", to = "out" } }]

[targets.broken]
depends = ["missing"]
"#,
    );
    write(tmp.path(), "src/a.txt", "");

    kiln()
        .arg("first")
        .current_dir(tmp.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown target `missing`"));

    assert!(!tmp.path().join("out").exists());
}

#[test]
fn test_duplicate_target_name() {
    let tmp = project("[targets.build]\n\n[targets.build]\n");

    kiln()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("target `build` is already defined"));
}

#[test]
fn test_unknown_config_key() {
    let tmp = project(
        r#"
[templates.base]
bindir = "bin"

[targets.x]
template = "base"
config = { bindri = "out" }
"#,
    );

    kiln()
        .arg("x")
        .current_dir(tmp.path())
        .assert()
        .code(8)
        .stderr(predicate::str::contains("bindri"));
}

#[test]
fn test_missing_copy_source_skips_rest() {
    let tmp = project(GAME);

    kiln()
        .current_dir(tmp.path())
        .assert()
        .code(6)
        .stderr(predicate::str::contains("target `content` failed"))
        .stderr(predicate::str::contains("Skipped all"));
}

#[cfg(unix)]
#[test]
fn test_failing_program_still_runs_after_hook() {
    let tmp = project(
        r#"
[targets.compile]
steps = [{ run = { program = "sh", args = ["-c", "exit 3"] } }]

[targets.cleanup]
after = "compile"
steps = [{ run = { program = "sh", args = ["-c", "echo done > hook.txt"] } }]

[targets.docs]
"#,
    );

    kiln()
        .args(["compile", "docs"])
        .current_dir(tmp.path())
        .assert()
        .code(7)
        .stderr(predicate::str::contains("exit code 3"))
        .stderr(predicate::str::contains("Skipped docs"));

    assert!(tmp.path().join("hook.txt").exists());
}

#[test]
fn test_usage_error() {
    kiln().args(["--list", "--plan"]).assert().code(2);
}
