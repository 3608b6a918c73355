use std::path::Path;
use std::process::{Command, Output};
use std::time::{Duration, Instant};

fn run_launcher(cwd: &Path, args: &[&str]) -> (Output, Duration) {
    let begin = Instant::now();
    let output = Command::new(env!("CARGO_BIN_EXE_daemon-launcher"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    (output, begin.elapsed())
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| l.to_string())
        .collect()
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn test_missing_daemon_still_waits_and_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();

    let (output, elapsed) = run_launcher(dir.path(), &[]);

    assert!(output.status.success());
    assert!(elapsed >= Duration::from_millis(2900));
    assert!(elapsed < Duration::from_secs(10));

    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "Parent init");
    assert_eq!(lines[1], "Ready to start command daemon");
    assert!(lines[2].starts_with("Run command daemon error: "));
    assert_eq!(lines[3], "Waiting to die");
    assert_eq!(lines[4], "Main process died");
}

#[cfg(unix)]
#[test]
fn test_sibling_daemon_is_started_detached() {
    let dir = tempfile::tempdir().unwrap();
    // The daemon outlives the launcher's wait; it records that it ran and
    // lets go of the inherited stdout so the launcher's pipe can close.
    write_script(
        &dir.path().join("signal"),
        "exec >/dev/null 2>&1\necho $$ > started\nsleep 3",
    );

    let (output, elapsed) = run_launcher(dir.path(), &["--wait", "1"]);

    assert!(output.status.success());
    assert!(elapsed >= Duration::from_millis(900));
    assert!(elapsed < Duration::from_secs(3));
    assert_eq!(
        stdout_lines(&output),
        vec![
            "Parent init",
            "Ready to start command daemon",
            "Waiting to die",
            "Main process died",
        ]
    );

    let pid = std::fs::read_to_string(dir.path().join("started")).unwrap();
    let pid = pid.trim();
    assert!(!pid.is_empty());

    // Still running after the launcher is gone.
    #[cfg(target_os = "linux")]
    assert!(Path::new(&format!("/proc/{pid}")).exists());

    let _ = Command::new("kill").arg(pid).status();
}

#[cfg(unix)]
#[test]
fn test_failing_daemon_is_not_observed() {
    let dir = tempfile::tempdir().unwrap();
    write_script(&dir.path().join("signal"), "exit 42");

    let (output, _) = run_launcher(dir.path(), &["--wait", "0"]);

    assert!(output.status.success());
    assert_eq!(stdout_lines(&output).len(), 4);
}

#[test]
fn test_program_override() {
    let dir = tempfile::tempdir().unwrap();

    let (output, _) = run_launcher(dir.path(), &["--program", "true", "--wait", "0"]);

    assert!(output.status.success());
    assert_eq!(stdout_lines(&output).len(), 4);
}

#[test]
fn test_config_file_sets_program_and_wait() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("launcher.toml"),
        "[launch]\nprogram = \"./missing-daemon\"\n\n[wait]\nsecs = 0\n",
    )
    .unwrap();

    let (output, elapsed) = run_launcher(dir.path(), &[]);

    assert!(output.status.success());
    assert!(elapsed < Duration::from_secs(2));
    let lines = stdout_lines(&output);
    assert!(lines[2].starts_with("Run command daemon error: "));
}

#[test]
fn test_malformed_config_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("launcher.toml"), "[wait\nsecs = 0\n").unwrap();

    let (output, _) = run_launcher(dir.path(), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to parse config"));
}

#[test]
fn test_dry_run_does_not_launch() {
    let dir = tempfile::tempdir().unwrap();

    let (output, elapsed) = run_launcher(dir.path(), &["--dry-run"]);

    assert!(output.status.success());
    assert!(elapsed < Duration::from_secs(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Program: ./signal"));
    assert!(stdout.contains("Wait: 3s"));
    assert!(!stdout.contains("Parent init"));
}
