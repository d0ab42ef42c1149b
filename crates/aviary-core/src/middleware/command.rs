use super::{Next, Stage};
use crate::error::{Error, Result};
use crate::types::MessageContext;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;

/// Pipe the current message text to an external command's stdin and replace
/// it with the command's stdout, for ad-hoc post-processing (spell-check,
/// translation, moderation) the pipeline itself doesn't implement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

pub struct CommandStage {
    config: Config,
}

impl CommandStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Stage for CommandStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        let mut child = TokioCommand::new(&self.config.command)
            .args(&self.config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| Error::LocalFatal(format!("failed to spawn command stage '{}': {e}", self.config.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(ctx.message.text.as_bytes())
                .await
                .map_err(|e| Error::LocalFatal(format!("failed to write to command stage stdin: {e}")))?;
        }

        let output = tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| Error::LocalFatal(format!("command stage '{}' timed out", self.config.command)))?
            .map_err(|e| Error::LocalFatal(format!("command stage '{}' failed: {e}", self.config.command)))?;

        if !output.status.success() {
            return Err(Error::LocalFatal(format!(
                "command stage '{}' exited with {}: {}",
                self.config.command,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        ctx.message.text = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        next.run(ctx).await
    }
}
