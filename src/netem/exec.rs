use std::process::Command;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::ShellCommand;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {}", describe_exit(.code))]
    Failed { command: String, code: Option<i32> },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "a signal".to_string(),
    }
}

/// Runs one command to completion and reports its exit code (`None` when
/// killed by a signal).
pub trait CommandRunner {
    fn run(&mut self, cmd: &ShellCommand) -> std::io::Result<Option<i32>>;
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, cmd: &ShellCommand) -> std::io::Result<Option<i32>> {
        let status = Command::new(&cmd.program).args(&cmd.args).status()?;
        Ok(status.code())
    }
}

/// Prints commands instead of running them.
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&mut self, cmd: &ShellCommand) -> std::io::Result<Option<i32>> {
        println!("{cmd}");
        Ok(Some(0))
    }
}

/// Runs `cmds` in order, stopping at the first failure that is not best-effort.
pub fn apply<R: CommandRunner>(cmds: &[ShellCommand], runner: &mut R) -> Result<(), ExecError> {
    for cmd in cmds {
        info!(command = %cmd, "Running");
        let code = runner.run(cmd).map_err(|source| ExecError::Spawn {
            command: cmd.to_string(),
            source,
        })?;
        match code {
            Some(0) => {}
            _ if cmd.best_effort => {
                debug!(command = %cmd, ?code, "Ignoring failure");
            }
            _ => {
                warn!(command = %cmd, ?code, "Command failed");
                return Err(ExecError::Failed { command: cmd.to_string(), code });
            }
        }
    }
    Ok(())
}
