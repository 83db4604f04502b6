use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const WATERMARK_PAGE: &str = "<html><body><div id=\"root\"></div>\
<a class=\"watermark\" href=\"https://chainlit.io\" target=\"_blank\">Built with Chainlit</a>\
</body></html>";

fn cmd() -> Command {
    Command::cargo_bin("restamp").expect("restamp binary")
}

fn write_fixture(tmp: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = tmp.path().join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

#[test]
fn apply_rewrites_the_watermark_anchor() {
    let tmp = TempDir::new().expect("temp dir");
    let input = write_fixture(&tmp, "chat.html", WATERMARK_PAGE);
    let output = tmp.path().join("out.html");

    cmd()
        .args([
            "apply",
            input.to_str().expect("utf8 path"),
            "--output",
            output.to_str().expect("utf8 path"),
        ])
        .assert()
        .success()
        .stdout(contains("watermark replaced"));

    let html = fs::read_to_string(&output).expect("read output");
    assert!(html.contains("data-customized=\"true\""));
    assert!(html.contains("Copyright © 2025 Harry Mardika"));
    assert!(!html.contains("chainlit.io"));
}

#[test]
fn apply_honors_the_config_file() {
    let tmp = TempDir::new().expect("temp dir");
    let input = write_fixture(&tmp, "chat.html", WATERMARK_PAGE);
    let config = write_fixture(
        &tmp,
        "restamp.toml",
        "[notice]\nowner = \"Example University\"\nyear = 2024\n",
    );
    let output = tmp.path().join("out.html");

    cmd()
        .args([
            "--config",
            config.to_str().expect("utf8 path"),
            "apply",
            input.to_str().expect("utf8 path"),
            "--output",
            output.to_str().expect("utf8 path"),
        ])
        .assert()
        .success();

    let html = fs::read_to_string(&output).expect("read output");
    assert!(html.contains("Copyright © 2024 Example University"));
}

#[test]
fn scan_reports_the_matching_heuristic() {
    let tmp = TempDir::new().expect("temp dir");
    let input = write_fixture(&tmp, "chat.html", WATERMARK_PAGE);

    cmd()
        .args(["scan", input.to_str().expect("utf8 path")])
        .assert()
        .success()
        .stdout(contains("a.watermark"));
}

#[test]
fn scan_handles_clean_documents() {
    let tmp = TempDir::new().expect("temp dir");
    let input = write_fixture(&tmp, "clean.html", "<html><body><p>hello</p></body></html>");

    cmd()
        .args(["scan", input.to_str().expect("utf8 path")])
        .assert()
        .success()
        .stdout(contains("no watermark candidate"));
}

#[test]
fn invalid_selector_in_config_fails_fast() {
    let tmp = TempDir::new().expect("temp dir");
    let input = write_fixture(&tmp, "chat.html", WATERMARK_PAGE);
    let config = write_fixture(&tmp, "restamp.toml", "[locate]\nselectors = [\"div > a\"]\n");

    cmd()
        .args([
            "--config",
            config.to_str().expect("utf8 path"),
            "scan",
            input.to_str().expect("utf8 path"),
        ])
        .assert()
        .failure()
        .stderr(contains("invalid selector"));
}
