use crate::shell::Shell;
use anyhow::Result;
use jsh_types::Context;
use nix::unistd::getpid;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, BufRead};
use tracing::debug;

const PROMPT: &str = "jsh> ";

/// Read-eval-print loop. Line editing comes from rustyline when stdin is a
/// terminal; otherwise lines are read plainly so the shell works under pipes.
pub struct Repl<'a> {
    pub shell: &'a mut Shell,
}

impl<'a> Repl<'a> {
    pub fn new(shell: &'a mut Shell) -> Self {
        Repl { shell }
    }

    pub fn run(&mut self, ctx: &Context) -> Result<i32> {
        if self.shell.interactive {
            self.run_interactive(ctx)
        } else {
            self.run_piped(ctx)
        }
    }

    fn run_interactive(&mut self, ctx: &Context) -> Result<i32> {
        debug!("starting interactive repl");
        let mut editor = DefaultEditor::new()?;
        loop {
            if let Some(code) = self.shell.exited {
                return Ok(code);
            }
            match editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(line).ok();
                    self.eval(ctx, line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => return Ok(0),
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn run_piped(&mut self, ctx: &Context) -> Result<i32> {
        debug!("starting piped repl");
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if let Some(code) = self.shell.exited {
                return Ok(code);
            }
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.eval(ctx, line);
        }
        Ok(self.shell.exited.unwrap_or(0))
    }

    fn eval(&mut self, ctx: &Context, line: &str) {
        eval_and_report(self.shell, ctx, line);
    }
}

/// Evaluates the lines of a `-c` command string through the same path the
/// repl uses.
pub fn run_command_string(shell: &mut Shell, ctx: &Context, input: &str) -> Result<i32> {
    for line in input.lines() {
        if let Some(code) = shell.exited {
            return Ok(code);
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        eval_and_report(shell, ctx, line);
    }
    Ok(shell.exited.unwrap_or(0))
}

fn eval_and_report(shell: &mut Shell, ctx: &Context, line: &str) {
    if let Err(err) = shell.eval_line(ctx, line) {
        eprintln!("{err}");
        if getpid() != shell.pid {
            // An error surfaced on a forked child's path: the child must die
            // here, never return to the loop.
            std::process::exit(0);
        }
    }
}
