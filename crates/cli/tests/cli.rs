use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("outlet").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("routes"));
}

#[test]
fn serve_help_documents_overrides() {
    let mut cmd = Command::cargo_bin("outlet").unwrap();
    cmd.arg("serve").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Port to listen on"))
        .stdout(predicate::str::contains("--database-url"));
}

#[test]
fn routes_prints_mount_table() {
    let config_dir = std::env::temp_dir().join("outlet-cli-routes-test");
    std::fs::create_dir_all(&config_dir).unwrap();

    let mut cmd = Command::cargo_bin("outlet").unwrap();
    cmd.arg("routes")
        .arg("--config-dir")
        .arg(&config_dir)
        .env("OUTLET_ENV", "local")
        .env("RUST_LOG", "error");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("books"))
        .stdout(predicate::str::contains("/admin"));
}

#[test]
fn unknown_environment_is_rejected() {
    let mut cmd = Command::cargo_bin("outlet").unwrap();
    cmd.arg("routes").arg("--env").arg("moon");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unsupported environment"));
}
