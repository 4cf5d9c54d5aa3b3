use std::process::{Command, Stdio};

fn run_jsh(command: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_jsh"))
        .args(["-c", command])
        .stdin(Stdio::null())
        .output()
        .expect("failed to execute jsh")
}

fn stderr_of(command: &str) -> String {
    let output = run_jsh(command);
    assert!(output.status.success(), "shell died on: {command}");
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn exit_terminates_with_status_zero() {
    for builtin in ["exit", "quit"] {
        let output = run_jsh(builtin);
        assert!(output.status.success());
        assert!(output.stdout.is_empty());
    }
}

#[test]
fn nothing_runs_after_exit() {
    let output = run_jsh("exit\necho unreachable");
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn jobs_on_an_empty_table_prints_nothing() {
    let output = run_jsh("jobs");
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
}

#[test]
fn fg_usage_errors() {
    assert!(stderr_of("fg").contains("Usage: fg <jobid>."));
    assert!(stderr_of("fg 1 2").contains("Usage: fg <jobid>."));
    assert!(stderr_of("fg zero").contains("Usage: fg <jobid>."));
    assert!(stderr_of("fg 0").contains("Usage: fg <jobid>."));
}

#[test]
fn bg_usage_errors() {
    assert!(stderr_of("bg").contains("Usage: bg <jobid>."));
    assert!(stderr_of("bg x").contains("Usage: bg <jobid>."));
}

#[test]
fn fg_and_bg_on_absent_jobs() {
    assert!(stderr_of("fg 1").contains("fg 1: No such job."));
    assert!(stderr_of("bg 7").contains("bg 7: No such job."));
}

#[test]
fn slay_family_usage_errors() {
    assert!(stderr_of("slay").contains("Usage: slay <pid> | slay <jobid> <index>."));
    assert!(stderr_of("halt 1 2 3").contains("Usage: halt <pid> | halt <jobid> <index>."));
    assert!(stderr_of("cont abc").contains("Usage: cont <pid> | cont <jobid> <index>."));
}

#[test]
fn slay_family_absent_targets() {
    assert!(stderr_of("slay 99999").contains("No process with pid 99999."));
    assert!(stderr_of("halt 1 0").contains("No job with id 1."));
    assert!(stderr_of("cont 4 2").contains("No job with id 4."));
}

#[test]
fn builtin_errors_leave_the_loop_running() {
    let output = run_jsh("slay 99999\necho alive");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "alive\n");
}
