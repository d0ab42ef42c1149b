use super::command::CommandProvider;
use super::GenerateMessage;
use crate::error::{Error, Result};
use crate::template::{self, TemplateMode};
use crate::types::Message;
use std::collections::HashMap;

/// Runs an external command whose stdout is parsed as a single JSON object
/// and rendered through a template, producing at most one message per tick.
pub struct JsonCommandProvider {
    command: CommandProvider,
    template: String,
}

impl JsonCommandProvider {
    pub fn new(
        command: String,
        args: Vec<String>,
        cwd: Option<String>,
        env: HashMap<String, String>,
        timeout_secs: u64,
        template: String,
    ) -> Self {
        Self {
            command: CommandProvider::new(command, args, cwd, env, timeout_secs),
            template,
        }
    }
}

#[async_trait::async_trait]
impl GenerateMessage for JsonCommandProvider {
    async fn generate(&mut self) -> Result<Vec<Message>> {
        let raw = self.command.run().await?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let data: serde_json::Value = serde_json::from_str(&raw).map_err(|e| Error::Validation(format!("jsoncommand output is not valid JSON: {e}")))?;
        let text = template::render(&self.template, &data, TemplateMode::Strict)?;
        let attachments = template::extract_attachments(&data, &Default::default());
        Ok(vec![Message { text, attachments }])
    }
}
