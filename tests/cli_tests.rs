//! CLI integration tests for the `assetline` binary.
//!
//! Runs the real binary against temporary projects and checks exit codes
//! and printed summaries.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run assetline in `dir` and return (stdout, stderr, exit code).
fn run(dir: &Path, args: &[&str]) -> (String, String, Option<i32>) {
    let output = Command::new(env!("CARGO_BIN_EXE_assetline"))
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("Failed to execute assetline");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code())
}

fn project(config: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("assetline.toml"), config).unwrap();
    fs::create_dir_all(temp.path().join("src/scss")).unwrap();
    fs::write(temp.path().join("src/scss/app.scss"), "a { color: red; }\n").unwrap();
    temp
}

#[test]
fn test_build_prints_summary() {
    let temp = project("[project]\nname = \"site\"\n");
    let (stdout, stderr, code) = run(temp.path(), &["build"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);
    assert!(stdout.contains("Build succeeded"));
    assert!(temp.path().join("dist/css/app.css").is_file());
}

#[test]
fn test_build_finds_config_from_subdirectory() {
    let temp = project("[project]\nname = \"site\"\nout = \"public\"\n");
    let nested = temp.path().join("src/scss");
    let (_, stderr, code) = run(&nested, &["build", "--only", "styles"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);
    assert!(temp.path().join("public/css/app.css").is_file());
}

#[test]
fn test_build_never_binds_the_server_port() {
    // Hold the configured port; a build that tried to serve would fail
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let temp = project(&format!(
        "[project]\nname = \"site\"\n\n[serve]\nhost = \"127.0.0.1\"\nport = {}\n",
        port
    ));

    let (_, stderr, code) = run(temp.path(), &["build"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);
}

#[test]
fn test_dry_run_lists_plan() {
    let temp = project("[project]\nname = \"site\"\n\n[sprite]\nenabled = false\n");
    let (stdout, _, code) = run(temp.path(), &["build", "--dry-run"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("would run 5 task(s)"));
    for task in ["templates", "styles", "scripts", "fonts", "images"] {
        assert!(stdout.contains(&format!("  {}\n", task)), "missing {}", task);
    }
    assert!(!stdout.contains("sprite"));
    assert!(!temp.path().join("dist").exists());
}

#[test]
fn test_invalid_config_exits_with_2() {
    let temp = project("[project]\nname = \"site\"\n\n[images]\npng_level = 9\n");
    let (_, stderr, code) = run(temp.path(), &["build"]);
    assert_eq!(code, Some(2));
    assert!(stderr.contains("images.png_level"));
}

#[test]
fn test_failed_build_exits_with_1() {
    let temp = project("[project]\nname = \"site\"\n");
    fs::write(temp.path().join("src/scss/app.scss"), "a { color: $nope; }\n").unwrap();
    fs::create_dir_all(temp.path().join("src/js")).unwrap();
    fs::write(temp.path().join("src/js/app.js"), "if (\n").unwrap();

    let (_, stderr, code) = run(temp.path(), &["build"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("scripts"));
}
