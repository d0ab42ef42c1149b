use super::{Next, Stage};
use crate::error::Result;
use crate::template;
use crate::types::{AttachmentConfig, MessageContext};
use serde::{Deserialize, Serialize};

/// Extract an attachment array from the scratch JSON data (under `"json"`)
/// and attach it to the outgoing message.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub attachment_config: AttachmentConfig,
}

pub struct AttachmentStage {
    config: Config,
}

impl AttachmentStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Stage for AttachmentStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        if let Some(data) = ctx.scratch.get("json").cloned() {
            let attachments = template::extract_attachments(&data, &self.config.attachment_config);
            ctx.message.attachments.extend(attachments);
        }
        next.run(ctx).await
    }
}
