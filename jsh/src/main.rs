use clap::Parser;
use jsh::repl::{self, Repl};
use jsh::shell::Shell;
use jsh::signals;
use jsh_types::Context;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Evaluate the given line(s) and exit instead of reading from stdin
    #[arg(short, long)]
    command: Option<String>,
}

fn main() -> ExitCode {
    // Respects RUST_LOG; silent by default.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut shell = Shell::new();
    signals::install_signal_handlers(shell.pgid, shell.interactive);
    let ctx = Context::new(shell.pid, shell.pgid, shell.interactive);
    debug!(
        "starting jsh pid:{} pgid:{} interactive:{}",
        shell.pid, shell.pgid, shell.interactive
    );

    let result = match cli.command.as_deref() {
        Some(input) => repl::run_command_string(&mut shell, &ctx, input),
        None => Repl::new(&mut shell).run(&ctx),
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("jsh: {err:?}");
            ExitCode::FAILURE
        }
    }
}
