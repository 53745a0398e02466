//! CLI smoke tests: argument surface and a full build through the binary.

mod common;

use assert_cmd::Command;
use common::write_archive;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn help_describes_the_tool() {
    Command::cargo_bin("stagepack")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("release"));
}

#[test]
fn requires_archive_or_home() {
    let out = TempDir::new().unwrap();
    Command::cargo_bin("stagepack")
        .unwrap()
        .args(["--out", out.path().to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--archive or --home"));
}

#[test]
fn builds_an_archive_and_prints_the_release_path() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let archive = write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("web.bundle.json", b"{}".as_slice()),
            ("app.core/config.json", br#"{"description":"Core"}"#.as_slice()),
        ],
    );

    Command::cargo_bin("stagepack")
        .unwrap()
        .args([
            "--archive",
            archive.to_str().unwrap(),
            "--out",
            out.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(out.path().join("web").to_str().unwrap()));

    let bundle_dir = out.path().join("web");
    let releases: Vec<_> = std::fs::read_dir(&bundle_dir).unwrap().collect();
    assert_eq!(releases.len(), 1);
}

#[test]
fn scan_mode_builds_every_archive() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_archive(
        home.path(),
        "app",
        "1.0.0",
        &[
            ("web.bundle.json", b"{}".as_slice()),
            ("app.core/config.json", b"{}".as_slice()),
        ],
    );
    write_archive(
        home.path(),
        "lib",
        "2.0.0",
        &[
            ("kit.bundle.json", b"{}".as_slice()),
            ("lib.text/config.json", b"{}".as_slice()),
        ],
    );

    Command::cargo_bin("stagepack")
        .unwrap()
        .args([
            "--home",
            home.path().to_str().unwrap(),
            "--out",
            out.path().to_str().unwrap(),
        ])
        .assert()
        .success();

    assert!(out.path().join("web").is_dir());
    assert!(out.path().join("kit").is_dir());
}

#[test]
fn invalid_archive_path_fails() {
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    // Version directory does not match the version pattern.
    let archive = write_archive(
        home.path(),
        "app",
        "latest",
        &[("app.core/config.json", b"{}".as_slice())],
    );

    Command::cargo_bin("stagepack")
        .unwrap()
        .args([
            "--archive",
            archive.to_str().unwrap(),
            "--out",
            out.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid archive path"));
}
