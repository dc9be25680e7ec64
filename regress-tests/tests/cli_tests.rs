//! CLI integration tests
//!
//! Drive the `regress` binary end to end in scratch directories, using shell
//! scripts as the program under test and `true` as the build command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn regress(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("regress").unwrap();
    cmd.arg("-C").arg(dir).arg("--no-color");
    cmd
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Test basic command help
#[test]
fn test_help_output() {
    let mut cmd = Command::cargo_bin("regress").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--exe"))
        .stdout(predicate::str::contains("--suffix"))
        .stdout(predicate::str::contains("--out"));
}

/// Missing output mode is a usage error
#[test]
fn test_missing_output_mode() {
    let temp_dir = TempDir::new().unwrap();
    regress(temp_dir.path())
        .args(["-e", "prog", "-s", "old"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"));
}

/// Shared-executable mode needs an executable name
#[test]
fn test_txt_mode_requires_exe() {
    let temp_dir = TempDir::new().unwrap();
    regress(temp_dir.path()).args(["-o", "test", "-s", "old"]).assert().code(2);
}

/// The scratch label cannot be used for baselines
#[test]
fn test_tmp_suffix_rejected() {
    let temp_dir = TempDir::new().unwrap();
    regress(temp_dir.path()).args(["-o", "gen", "-s", "tmp", "-e", "prog"]).assert().code(2);
}

/// Negative line counts other than -1 are rejected
#[test]
fn test_invalid_line_limit() {
    let temp_dir = TempDir::new().unwrap();
    regress(temp_dir.path()).args(["-o", "print", "-e", "prog", "-n", "-5"]).assert().code(2);
}

/// Remove deletes labelled baselines and leaves inputs alone
#[test]
fn test_remove_baselines() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("test-a.txt"), "1\n").unwrap();
    fs::write(dir.join("test-a_old.txt"), "out\n").unwrap();
    fs::write(dir.join("test-b_old.txt"), "out\n").unwrap();
    fs::write(dir.join("test-b_new.txt"), "out\n").unwrap();

    regress(dir)
        .args(["-o", "rm", "-s", "old"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removing _old.txt files:"))
        .stdout(predicate::str::contains("rm test-a_old.txt"))
        .stdout(predicate::str::contains("rm test-b_old.txt"));

    assert!(dir.join("test-a.txt").exists());
    assert!(dir.join("test-b_new.txt").exists());
    assert!(!dir.join("test-a_old.txt").exists());
    assert!(!dir.join("test-b_old.txt").exists());
}

/// A failing build exits with 3 before any program runs
#[cfg(unix)]
#[test]
fn test_build_failure_exit_code() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("test-a.txt"), "1\n").unwrap();
    write_script(dir, "prog", "touch ran");

    regress(dir)
        .args(["-o", "test", "-s", "old", "-e", "prog", "--make", "sh -c 'echo broken; exit 1'"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("Error: Build was not successful."))
        .stdout(predicate::str::contains("Cleaning up:").not());

    assert!(!dir.join("ran").exists());
}

/// Generate baselines, then test against them
#[cfg(unix)]
#[test]
fn test_generate_then_test() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("test-a.txt"), "alpha\n").unwrap();
    fs::write(dir.join("test-b.txt"), "beta\n").unwrap();
    write_script(dir, "prog", "cat");

    regress(dir)
        .args(["-o", "gen", "-s", "old", "-e", "prog", "--make", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generating \"test-*_old.txt\" files..."))
        .stdout(predicate::str::contains("test-a_old.txt"))
        .stdout(predicate::str::contains("Cleaning up:"));

    assert_eq!(fs::read_to_string(dir.join("test-a_old.txt")).unwrap(), "alpha\n");
    assert_eq!(fs::read_to_string(dir.join("test-b_old.txt")).unwrap(), "beta\n");

    regress(dir)
        .args(["-o", "test", "-s", "old", "-e", "prog", "--make", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tests Passed:\ntest-a.txt\ntest-b.txt"))
        .stdout(predicate::str::contains("Tests Failed:\nNone"));

    assert!(!dir.join("test-a_tmp.txt").exists());
}

/// Changed output shows up as a failure with its diff
#[cfg(unix)]
#[test]
fn test_failure_with_diff() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("test-a.txt"), "new line\n").unwrap();
    fs::write(dir.join("test-a_old.txt"), "old line\n").unwrap();
    fs::write(dir.join("test-c.txt"), "c\n").unwrap();
    write_script(dir, "prog", "cat");

    regress(dir)
        .args(["-o", "test", "-s", "old", "-e", "prog", "--make", "true", "-d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tests with no _old.txt:\ntest-c.txt"))
        .stdout(predicate::str::contains("Tests Failed:\ntest-a.txt"))
        .stdout(predicate::str::contains("-old line"))
        .stdout(predicate::str::contains("+new line"));

    assert!(!dir.join("test-a_tmp.txt").exists());
    assert!(!dir.join("test-c_tmp.txt").exists());
}

/// Output that is not valid UTF-8 is compared and stored byte for byte
#[cfg(unix)]
#[test]
fn test_non_utf8_output_is_exact() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("test-a.txt"), "").unwrap();
    fs::write(dir.join("test-a_old.txt"), [0xfe, b'\n']).unwrap();
    write_script(dir, "prog", "printf '\\377\\n'");

    regress(dir)
        .args(["-o", "test", "-s", "old", "-e", "prog", "--make", "true", "-d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tests Failed:\ntest-a.txt"))
        .stdout(predicate::str::contains("0 passed, 1 failed, 0 without baseline"));

    regress(dir)
        .args(["-o", "gen", "-s", "new", "-e", "prog", "--make", "true"])
        .assert()
        .success();

    assert_eq!(fs::read(dir.join("test-a_new.txt")).unwrap(), [0xff, b'\n']);
}

/// A successful build whose output mentions "Error" is flagged on stdout
#[cfg(unix)]
#[test]
fn test_build_error_text_is_noted() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("test-a.txt"), "x\n").unwrap();
    write_script(dir, "prog", "cat");

    regress(dir)
        .env_remove("RUST_LOG")
        .args(["-o", "print", "-e", "prog", "--make", "echo make: *** Error 1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("builds are judged by exit status only"))
        .stdout(predicate::str::contains("Build successful."));
}

/// Print mode truncates to n + 1 lines
#[cfg(unix)]
#[test]
fn test_print_truncates() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("test-a.txt"), "one\ntwo\nthree\n").unwrap();
    write_script(dir, "prog", "cat");

    regress(dir)
        .args(["-o", "print", "-e", "prog", "--make", "true", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Output for test-a.txt:\none\ntwo\n"))
        .stdout(predicate::str::contains("three").not());
}

/// Program arguments are split like a shell would
#[cfg(unix)]
#[test]
fn test_program_arguments_passed() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("test-a.txt"), "").unwrap();
    write_script(dir, "prog", "for arg in \"$@\"; do echo \"[$arg]\"; done");

    regress(dir)
        .args(["-o", "print", "-e", "prog", "--make", "true", "-a", "-v \"two words\""])
        .assert()
        .success()
        .stdout(predicate::str::contains("[-v]\n[two words]"));
}
