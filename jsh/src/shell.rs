use crate::jobs::JobClass;
use crate::parser::{self, Pipeline};
use crate::process;
use crate::signals::{self, SignalBlocker};
use anyhow::{anyhow, Context as _, Result};
use jsh_builtin::ShellProxy;
use jsh_types::{Context, JshError};
use libc::{c_int, STDIN_FILENO};
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{getpid, isatty, setpgid, tcsetpgrp, Pid};
use tracing::debug;

pub const SHELL_TERMINAL: c_int = STDIN_FILENO;

pub struct Shell {
    pub pid: Pid,
    pub pgid: Pid,
    pub interactive: bool,
    pub exited: Option<i32>,
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        f.debug_struct("Shell")
            .field("pid", &self.pid)
            .field("pgid", &self.pgid)
            .field("interactive", &self.interactive)
            .finish()
    }
}

impl Shell {
    pub fn new() -> Self {
        let pid = getpid();
        let pgid = pid;
        let interactive = isatty(SHELL_TERMINAL).unwrap_or(false);

        if interactive {
            // Own group, owning the terminal, before any job is launched.
            let _ = setpgid(pgid, pgid);
            let _ = tcsetpgrp(SHELL_TERMINAL, pgid);
        }

        Shell {
            pid,
            pgid,
            interactive,
            exited: None,
        }
    }

    /// Parses one input line and either runs a builtin or launches the
    /// pipeline as a job.
    pub fn eval_line(&mut self, ctx: &Context, line: &str) -> Result<()> {
        let pipeline = match parser::parse(line)? {
            Some(pipeline) => pipeline,
            None => return Ok(()),
        };
        if !self.handle_builtin(ctx, &pipeline) {
            process::launch_pipeline(ctx, &pipeline)?;
        }
        Ok(())
    }

    /// Runs the leading command as a builtin if its name is registered.
    /// Builtins report their own errors; the repl loop is never disturbed.
    fn handle_builtin(&mut self, ctx: &Context, pipeline: &Pipeline) -> bool {
        let command = &pipeline.commands[0];
        let cmd_fn = match jsh_builtin::get_command(&command.name) {
            Some(cmd_fn) => cmd_fn,
            None => return false,
        };
        debug!("builtin '{}' argv:{:?}", command.name, command.argv);
        cmd_fn(ctx, command.argv.clone(), self);
        true
    }

    fn builtin_jobs(&mut self, ctx: &Context) -> Result<()> {
        let _guard = SignalBlocker::new();
        let listing = signals::job_table().to_string();
        if !listing.is_empty() {
            ctx.write_stdout(listing.trim_end())?;
        }
        Ok(())
    }

    /// fg: continue the job's group, give it the terminal, wait for it.
    fn builtin_fg(&mut self, ctx: &Context, argv: &[String]) -> Result<()> {
        let job_id = parse_job_id("fg", argv)?;
        let _guard = SignalBlocker::new();
        {
            let mut table = signals::job_table();
            let job = table
                .get_job_mut(job_id)
                .ok_or(JshError::NoSuchJob { cmd: "fg", job_id })?;
            let pgid = job
                .pgid
                .ok_or_else(|| JshError::System(format!("job {job_id} has no process group")))?;

            job.class = JobClass::Foreground;

            if ctx.interactive {
                if let Err(err) = tcsetpgrp(SHELL_TERMINAL, pgid) {
                    job.class = JobClass::Background;
                    return Err(anyhow!(err)
                        .context("failed to transfer terminal to foreground job"));
                }
            }
            if let Err(err) = killpg(pgid, Signal::SIGCONT) {
                job.class = JobClass::Background;
                return Err(anyhow!(err).context(format!("failed to continue job {job_id}")));
            }
            debug!("fg job [{}] pgid:{}", job_id, pgid);
        }
        signals::wait_for_foreground();
        Ok(())
    }

    /// bg: continue the job's group, leave it in the background.
    fn builtin_bg(&mut self, argv: &[String]) -> Result<()> {
        let job_id = parse_job_id("bg", argv)?;
        let _guard = SignalBlocker::new();
        let mut table = signals::job_table();
        let job = table
            .get_job_mut(job_id)
            .ok_or(JshError::NoSuchJob { cmd: "bg", job_id })?;
        let pgid = job
            .pgid
            .ok_or_else(|| JshError::System(format!("job {job_id} has no process group")))?;

        job.class = JobClass::Background;
        killpg(pgid, Signal::SIGCONT)
            .with_context(|| format!("failed to continue job {job_id}"))?;
        debug!("bg job [{}] pgid:{}", job_id, pgid);
        Ok(())
    }

    /// slay/halt/cont: pid-directed signal at one process, named either by
    /// pid or by (jobid, index).
    fn signal_process(&mut self, cmd: &'static str, signal: Signal, argv: &[String]) -> Result<()> {
        let usage = || JshError::Usage(format!("{cmd} <pid> | {cmd} <jobid> <index>"));
        let _guard = SignalBlocker::new();
        let table = signals::job_table();

        let pid = match argv {
            [_, pid_token] => {
                let raw: i32 = pid_token.parse().map_err(|_| usage())?;
                if raw < 1 {
                    return Err(usage().into());
                }
                let pid = Pid::from_raw(raw);
                if !table.contains_process(pid) {
                    return Err(JshError::NoSuchProcess(raw).into());
                }
                pid
            }
            [_, job_token, index_token] => {
                let job_id: u32 = job_token.parse().map_err(|_| usage())?;
                if job_id < 1 {
                    return Err(usage().into());
                }
                let index: usize = index_token.parse().map_err(|_| usage())?;
                let job = table.get_job(job_id).ok_or(JshError::NoJobWithId(job_id))?;
                job.process_at(index)
                    .ok_or(JshError::NoProcessAtIndex { job_id, index })?
            }
            _ => return Err(usage().into()),
        };

        debug!("{} -> pid:{} signal:{:?}", cmd, pid, signal);
        kill(pid, signal).with_context(|| format!("failed to signal pid {pid}"))?;
        Ok(())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellProxy for Shell {
    fn exit_shell(&mut self) {
        self.exited = Some(0);
    }

    fn dispatch(&mut self, ctx: &Context, cmd: &str, argv: Vec<String>) -> Result<()> {
        match cmd {
            "jobs" => self.builtin_jobs(ctx),
            "fg" => self.builtin_fg(ctx, &argv),
            "bg" => self.builtin_bg(&argv),
            "slay" => self.signal_process("slay", Signal::SIGKILL, &argv),
            "halt" => self.signal_process("halt", Signal::SIGSTOP, &argv),
            "cont" => self.signal_process("cont", Signal::SIGCONT, &argv),
            _ => Ok(()),
        }
    }
}

/// fg/bg argument parsing: exactly one numeric jobid ≥ 1.
fn parse_job_id(cmd: &'static str, argv: &[String]) -> Result<u32, JshError> {
    let usage = || JshError::Usage(format!("{cmd} <jobid>"));
    match argv {
        [_, token] => {
            let job_id: u32 = token.parse().map_err(|_| usage())?;
            if job_id < 1 {
                return Err(usage());
            }
            Ok(job_id)
        }
        _ => Err(usage()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn job_id_parsing_enforces_exactly_one_numeric_argument() {
        assert_eq!(parse_job_id("fg", &argv(&["fg", "2"])).unwrap(), 2);

        let missing = parse_job_id("fg", &argv(&["fg"])).unwrap_err();
        assert_eq!(missing.to_string(), "Usage: fg <jobid>.");

        let extra = parse_job_id("fg", &argv(&["fg", "1", "2"])).unwrap_err();
        assert_eq!(extra.to_string(), "Usage: fg <jobid>.");

        let word = parse_job_id("bg", &argv(&["bg", "one"])).unwrap_err();
        assert_eq!(word.to_string(), "Usage: bg <jobid>.");

        let zero = parse_job_id("bg", &argv(&["bg", "0"])).unwrap_err();
        assert_eq!(zero.to_string(), "Usage: bg <jobid>.");
    }

    #[test]
    fn signaling_unknown_targets_reports_and_leaves_table_alone() {
        let mut shell = Shell {
            pid: getpid(),
            pgid: getpid(),
            interactive: false,
            exited: None,
        };

        let err = shell
            .signal_process("slay", Signal::SIGKILL, &argv(&["slay", "99999"]))
            .unwrap_err();
        assert_eq!(err.to_string(), "No process with pid 99999.");

        let err = shell
            .signal_process("halt", Signal::SIGSTOP, &argv(&["halt", "1", "0"]))
            .unwrap_err();
        assert_eq!(err.to_string(), "No job with id 1.");

        let err = shell
            .signal_process("cont", Signal::SIGCONT, &argv(&["cont"]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Usage: cont <pid> | cont <jobid> <index>."
        );

        assert!(signals::job_table().is_empty());
    }
}
