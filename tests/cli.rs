//! 命令行集成测试

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

const PAGE: &str = r#"<html><body><article>
    <h1>Release notes</h1>
    <p>This release improves startup time considerably.</p>
    <p>Read the <a href="https://example.com/changes">full changelog</a> for details.</p>
    <h2>Known issues</h2>
    <p>Some themes still render incorrectly.</p>
</article></body></html>"#;

fn write_page(dir: &Path, html: &str) -> std::path::PathBuf {
    let path = dir.join("page.html");
    fs::write(&path, html).expect("write page");
    path
}

fn command(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("page-translator").expect("binary");
    cmd.current_dir(dir).env_remove("TRANSLATOR_BLOCKS_PER_REQUEST");
    cmd
}

#[test]
fn test_preview_prints_planned_requests() {
    let dir = TempDir::new().expect("temp dir");
    let page = write_page(dir.path(), PAGE);

    let output = command(dir.path())
        .arg("preview")
        .arg(&page)
        .args(["--blocks-per-request", "3"])
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(report["totalItems"], 5);
    assert_eq!(report["blocksPerRequest"], 3);

    let batches = report["batches"].as_array().expect("batches");
    assert!(!batches.is_empty());
    assert!(batches
        .iter()
        .all(|batch| batch["blocks"].as_array().map_or(0, Vec::len) <= 3));

    let payloads: Vec<&str> = batches
        .iter()
        .filter_map(|batch| batch["request"]["payload"].as_str())
        .collect();
    assert!(payloads.iter().any(|p| p.contains("[LINK_0]full changelog[/LINK_0]")));
    assert!(payloads.iter().all(|p| !p.contains("<a ")));
}

#[test]
fn test_preview_rejects_unsupported_batch_size() {
    let dir = TempDir::new().expect("temp dir");
    let page = write_page(dir.path(), PAGE);

    command(dir.path())
        .arg("preview")
        .arg(&page)
        .args(["--blocks-per-request", "4"])
        .assert()
        .failure();
}

#[test]
fn test_preview_reads_config_file() {
    let dir = TempDir::new().expect("temp dir");
    let page = write_page(dir.path(), PAGE);
    let config = dir.path().join("custom.toml");
    fs::write(&config, "[request]\nblocks_per_request = 8\n").expect("write config");

    let output = command(dir.path())
        .arg("preview")
        .arg(&page)
        .arg("--config")
        .arg(&config)
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(report["blocksPerRequest"], 8);
    assert_eq!(report["batches"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_preview_missing_file_fails() {
    let dir = TempDir::new().expect("temp dir");

    command(dir.path())
        .arg("preview")
        .arg(dir.path().join("missing.html"))
        .assert()
        .failure();
}
