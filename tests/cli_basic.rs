//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary exists, accepts standard flags, and each subcommand
//! responds to `--help` with appropriate text.

#![allow(deprecated)] // cargo_bin deprecation — replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `sear` binary.
fn sear() -> Command {
    Command::cargo_bin("sear").expect("binary 'sear' should be built")
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    sear()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: sear"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("subtitles"))
        .stdout(predicate::str::contains("clips"))
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn short_help_flag_shows_usage() {
    sear()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: sear"));
}

#[test]
fn version_flag_shows_semver() {
    sear()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^sear \d+\.\d+\.\d+\n$").unwrap());
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn render_help_mentions_job_file() {
    sear()
        .args(["render", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("composition job"))
        .stdout(predicate::str::contains("--font"));
}

#[test]
fn subtitles_help_mentions_inputs() {
    sear()
        .args(["subtitles", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--transcript"))
        .stdout(predicate::str::contains("--srt"))
        .stdout(predicate::str::contains("--overlays"));
}

// ─── Error handling ──────────────────────────────────────────────────────────

#[test]
fn render_fails_cleanly_on_missing_job() {
    sear()
        .args(["render", "/nonexistent/job.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read job file"));
}

#[test]
fn subtitles_requires_an_input() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.ass");
    sear()
        .args(["subtitles", "--output"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

// ─── End-to-end markup compilation (no external tools needed) ────────────────

#[test]
fn subtitles_compiles_srt_to_ass() {
    let dir = tempfile::tempdir().unwrap();
    let srt = dir.path().join("in.srt");
    let out = dir.path().join("out.ass");
    std::fs::write(
        &srt,
        "1\n00:00:00,000 --> 00:00:02,000\nHello, world!\n\n\
         2\n00:00:02,500 --> 00:00:04,000\nSecond line\n\n",
    )
    .unwrap();

    sear()
        .arg("subtitles")
        .arg("--srt")
        .arg(&srt)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let doc = std::fs::read_to_string(&out).unwrap();
    assert!(doc.contains("[Script Info]"));
    assert!(doc.contains("PlayResX: 1920"));
    assert!(doc.contains("Hello, world!"));
    assert_eq!(doc.matches("Dialogue: ").count(), 2);
}

#[test]
fn subtitles_compiles_overlay_document() {
    let dir = tempfile::tempdir().unwrap();
    let overlays = dir.path().join("overlays.json");
    let out = dir.path().join("out.ass");
    std::fs::write(
        &overlays,
        r#"[{"text": "WAIT FOR IT", "position": [50.0, 20.0],
             "timing": {"start": 1.0, "end": 3.5}}]"#,
    )
    .unwrap();

    sear()
        .arg("subtitles")
        .arg("--overlays")
        .arg(&overlays)
        .arg("--output")
        .arg(&out)
        .arg("--duration")
        .arg("10")
        .assert()
        .success();

    let doc = std::fs::read_to_string(&out).unwrap();
    assert!(doc.contains("0:00:01.00,0:00:03.50"));
    assert!(doc.contains("WAIT FOR IT"));
}

#[test]
fn clips_validates_selector_output() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.json");
    std::fs::write(
        &good,
        r#"[{"start": 5.0, "end": 20.0, "title": "Opening hook"}]"#,
    )
    .unwrap();
    sear()
        .arg("clips")
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("00:00:05,000"))
        .stdout(predicate::str::contains("Opening hook"));

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, r#"[{"start": 20.0, "end": 5.0}]"#).unwrap();
    sear()
        .arg("clips")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid time range"));
}
