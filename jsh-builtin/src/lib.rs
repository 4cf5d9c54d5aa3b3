use anyhow::Result;
use jsh_types::{Context, ExitStatus};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

// Builtin command modules
mod bg;
mod cont;
mod fg;
mod halt;
mod jobs;
mod slay;

/// Interface builtin commands use to reach the shell without direct coupling.
pub trait ShellProxy {
    /// Initiates shell exit.
    fn exit_shell(&mut self);

    /// Dispatches a command to the shell's job-control logic.
    fn dispatch(&mut self, ctx: &Context, cmd: &str, argv: Vec<String>) -> Result<()>;
}

/// Signature every builtin command conforms to. `argv[0]` is the command name.
pub type BuiltinCommand =
    fn(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus;

/// Global registry of builtin commands.
pub static BUILTIN_COMMAND: Lazy<Mutex<HashMap<&str, BuiltinCommand>>> = Lazy::new(|| {
    let mut builtin = HashMap::new();

    builtin.insert("exit", exit as BuiltinCommand);
    builtin.insert("quit", exit as BuiltinCommand);

    // Job control commands
    builtin.insert("jobs", jobs::command as BuiltinCommand);
    builtin.insert("fg", fg::command as BuiltinCommand);
    builtin.insert("bg", bg::command as BuiltinCommand);
    builtin.insert("slay", slay::command as BuiltinCommand);
    builtin.insert("halt", halt::command as BuiltinCommand);
    builtin.insert("cont", cont::command as BuiltinCommand);

    Mutex::new(builtin)
});

/// Retrieves a builtin command function by name.
pub fn get_command(name: &str) -> Option<BuiltinCommand> {
    if let Ok(builtin) = BUILTIN_COMMAND.lock() {
        builtin.get(name).copied()
    } else {
        None
    }
}

/// Built-in exit/quit command: initiates graceful shell termination.
pub fn exit(_ctx: &Context, _argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    debug!("exit command called - initiating shell exit");
    proxy.exit_shell();
    ExitStatus::ExitedWith(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_all_job_control_builtins() {
        for name in ["quit", "exit", "jobs", "fg", "bg", "slay", "halt", "cont"] {
            assert!(get_command(name).is_some(), "missing builtin {name}");
        }
    }

    #[test]
    fn registry_rejects_unknown_names() {
        assert!(get_command("Fg").is_none());
        assert!(get_command("kill").is_none());
        assert!(get_command("").is_none());
    }
}
