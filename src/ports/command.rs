use async_trait::async_trait;
use std::io;

/// Captured result of one external tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Diagnostic text for error reporting: stderr, or the exit status when stderr is empty.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exited with code {}", code),
            None => String::from("terminated by signal"),
        }
    }
}

/// Narrow seam for every external binary (ffprobe, ffmpeg) the pipeline runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion and capture its output.
    /// Only spawn failures are reported as `Err`; a non-zero exit is a normal `Ok`.
    async fn invoke(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}
