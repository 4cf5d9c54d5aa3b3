use super::ShellProxy;
use jsh_types::{Context, ExitStatus};

/// Built-in fg command: brings a job to the foreground and waits for it.
pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    match proxy.dispatch(ctx, "fg", argv) {
        Ok(_) => ExitStatus::ExitedWith(0),
        Err(e) => {
            ctx.write_stderr(&format!("{e}")).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
