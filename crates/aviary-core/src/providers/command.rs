use super::GenerateMessage;
use crate::error::{Error, Result};
use crate::types::Message;
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::Command as TokioCommand;

/// Runs an external command on every tick; its trimmed stdout becomes the
/// message text verbatim. A non-zero exit is treated as upstream-transient
/// so the scheduler retries on the next tick instead of disabling the
/// provider.
pub struct CommandProvider {
    command: String,
    args: Vec<String>,
    cwd: Option<String>,
    env: HashMap<String, String>,
    timeout_secs: u64,
}

impl CommandProvider {
    pub fn new(
        command: String,
        args: Vec<String>,
        cwd: Option<String>,
        env: HashMap<String, String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            command,
            args,
            cwd,
            env,
            timeout_secs,
        }
    }

    pub(crate) async fn run(&self) -> Result<String> {
        let mut cmd = TokioCommand::new(&self.command);
        cmd.args(&self.args).envs(&self.env);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| Error::UpstreamTransient {
                source: self.command.clone(),
                message: "command timed out".to_string(),
            })?
            .map_err(|e| Error::UpstreamTransient {
                source: self.command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::UpstreamTransient {
                source: self.command.clone(),
                message: format!("exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr)),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

#[async_trait::async_trait]
impl GenerateMessage for CommandProvider {
    async fn generate(&mut self) -> Result<Vec<Message>> {
        let text = self.run().await?;
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Message {
            text,
            attachments: Vec::new(),
        }])
    }
}
