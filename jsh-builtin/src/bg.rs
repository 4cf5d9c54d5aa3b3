use super::ShellProxy;
use jsh_types::{Context, ExitStatus};

/// Built-in bg command: resumes a stopped job in the background.
pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    match proxy.dispatch(ctx, "bg", argv) {
        Ok(_) => ExitStatus::ExitedWith(0),
        Err(e) => {
            ctx.write_stderr(&format!("{e}")).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
