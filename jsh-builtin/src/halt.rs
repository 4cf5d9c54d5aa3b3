use super::ShellProxy;
use jsh_types::{Context, ExitStatus};

/// Built-in halt command: sends SIGSTOP to one process, named by pid or by
/// (jobid, index).
pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    match proxy.dispatch(ctx, "halt", argv) {
        Ok(_) => ExitStatus::ExitedWith(0),
        Err(e) => {
            ctx.write_stderr(&format!("{e}")).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
