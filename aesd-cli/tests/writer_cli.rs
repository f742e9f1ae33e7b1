use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn writer() -> Command {
    Command::cargo_bin("aesd-writer").expect("aesd-writer binary")
}

#[test]
fn writes_text_without_trailing_newline() {
    let dir = TempDir::new().expect("tempdir");
    let target = dir.path().join("out.txt");

    writer().arg(&target).arg("ios").assert().success();

    assert_eq!(std::fs::read_to_string(&target).expect("read"), "ios");
}

#[test]
fn replaces_existing_content() {
    let dir = TempDir::new().expect("tempdir");
    let target = dir.path().join("out.txt");
    std::fs::write(&target, "a much longer previous body").expect("seed");

    writer().arg(&target).arg("short").assert().success();

    assert_eq!(std::fs::read_to_string(&target).expect("read"), "short");
}

#[test]
fn wrong_argument_count_exits_with_one() {
    writer()
        .arg("only-one-argument")
        .assert()
        .code(1)
        .stderr(predicate::str::is_empty().not());
}

#[test]
fn unwritable_path_exits_with_one() {
    let dir = TempDir::new().expect("tempdir");
    let target = dir.path().join("missing").join("out.txt");

    writer()
        .arg(&target)
        .arg("text")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to open the file"));
}
