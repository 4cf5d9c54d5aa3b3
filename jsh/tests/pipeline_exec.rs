use std::process::{Command, Stdio};
use std::time::Instant;

fn run_jsh(command: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_jsh"))
        .args(["-c", command])
        .stdin(Stdio::null())
        .output()
        .expect("failed to execute jsh")
}

#[test]
fn single_command_inherits_streams() {
    let output = run_jsh("echo hello");
    assert!(output.status.success(), "command failed: {output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
}

#[test]
fn quoted_arguments_stay_one_token() {
    let output = run_jsh("echo 'hello world'");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello world\n");
}

#[test]
fn two_stage_pipeline_wires_stdout_to_stdin() {
    let output = run_jsh("printf 'a\\nb\\n' | wc -l");
    assert!(output.status.success(), "command failed: {output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "2");
}

#[test]
fn three_stage_pipeline_runs_left_to_right() {
    let output = run_jsh("printf 'b\\na\\nc\\n' | sort | head -1");
    assert!(output.status.success(), "command failed: {output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "a");
}

#[test]
fn pipeline_with_closed_stdin_terminates() {
    // cat sees end-of-input immediately; both children exit and the shell
    // returns to the loop.
    let output = run_jsh("cat | wc -l");
    assert!(output.status.success(), "command failed: {output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "0");
}

#[test]
fn foreground_job_is_waited_for() {
    let started = Instant::now();
    let output = run_jsh("sleep 1");
    assert!(output.status.success(), "command failed: {output:?}");
    assert!(
        started.elapsed().as_millis() >= 900,
        "shell returned before the foreground job finished"
    );
}

#[test]
fn missing_command_reports_and_loop_survives() {
    let output = run_jsh("definitely_not_a_real_cmd_jsh\necho still-here");
    assert!(output.status.success(), "command failed: {output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("definitely_not_a_real_cmd_jsh: Command not found."),
        "stderr did not carry the diagnostic: {stderr}"
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout), "still-here\n");
}

#[test]
fn parse_errors_do_not_kill_the_shell() {
    let output = run_jsh("ls |\necho recovered");
    assert!(output.status.success(), "command failed: {output:?}");
    assert!(!output.stderr.is_empty(), "parse error was not reported");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "recovered\n");
}
