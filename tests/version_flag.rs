use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_version() {
    Command::cargo_bin("tuys-tui")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::cargo_bin("tuys-tui")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tuys-TUI"))
        .stdout(predicate::str::contains("--offline"));
}

#[test]
fn rejects_unknown_flags() {
    Command::cargo_bin("tuys-tui")
        .unwrap()
        .arg("--bogus")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown argument"));
}

#[test]
fn channel_requires_value() {
    Command::cargo_bin("tuys-tui")
        .unwrap()
        .arg("--channel")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--channel needs a value"));
}
