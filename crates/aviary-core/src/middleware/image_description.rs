use super::{Next, Stage};
use crate::error::Result;
use crate::types::MessageContext;
use serde::{Deserialize, Serialize};

/// Fill in a missing `description` (alt text) on attachments that lack one.
/// The actual captioning call is out of scope (mirrors the `RemoteClient`
/// boundary the dispatch engine draws around posting); this stage only
/// applies a fallback when no description was supplied upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_fallback")]
    pub fallback_text: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback_text: default_fallback(),
        }
    }
}

fn default_fallback() -> String {
    "Image attached".to_string()
}

pub struct ImageDescriptionStage {
    config: Config,
}

impl ImageDescriptionStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Stage for ImageDescriptionStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        for attachment in &mut ctx.message.attachments {
            if attachment.mime_type.starts_with("image/") && attachment.description.is_none() {
                attachment.description = Some(self.config.fallback_text.clone());
            }
        }
        next.run(ctx).await
    }
}
