use predicates::prelude::*;

#[test]
fn check_csync_help() {
    let mut cmd = assert_cmd::Command::cargo_bin("csync").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--sync"));
}

#[test]
fn check_csync_version() {
    let mut cmd = assert_cmd::Command::cargo_bin("csync").unwrap();
    cmd.arg("--version").assert().success();
}

#[test]
fn missing_config_is_an_error() {
    let mut cmd = assert_cmd::Command::cargo_bin("csync").unwrap();
    cmd.args(["--config", "/definitely/not/here.conf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
