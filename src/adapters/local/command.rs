use crate::ports::command::{CommandOutput, CommandRunner};
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

/// Runs external tools as child processes and captures their output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn invoke(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        info!("running: {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        if !result.success() && !result.stderr.trim().is_empty() {
            error!(program, code = ?result.exit_code, "stderr: {}", result.stderr.trim());
        }
        Ok(result)
    }
}
