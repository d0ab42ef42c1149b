use super::{Next, Stage};
use crate::error::Result;
use crate::types::MessageContext;
use serde::{Deserialize, Serialize};

/// Append a caption built from scratch JSON fields (`title`, `channel`) that
/// an earlier stage (typically a JSON command provider) stashed, so a bare
/// video link gets human-readable context.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {}

pub struct YoutubeCaptionStage {
    #[allow(dead_code)]
    config: Config,
}

impl YoutubeCaptionStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Stage for YoutubeCaptionStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        let data = ctx.scratch.get("json").cloned().unwrap_or(serde_json::Value::Null);
        let title = data.get("title").and_then(|v| v.as_str());
        let channel = data.get("channel").and_then(|v| v.as_str());
        match (title, channel) {
            (Some(title), Some(channel)) => {
                ctx.message.text = format!("{} — new upload from {}\n{}", title, channel, ctx.message.text);
            }
            (Some(title), None) => {
                ctx.message.text = format!("{}\n{}", title, ctx.message.text);
            }
            _ => {}
        }
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, ProviderConfig, ProviderKind, Visibility};
    use serde_json::json;

    fn base_ctx() -> MessageContext {
        MessageContext::new(
            Message {
                text: "https://youtu.be/abc".to_string(),
                attachments: Vec::new(),
            },
            ProviderConfig {
                name: "p".into(),
                kind: ProviderKind::Ping { message: "x".into() },
                cron: Some("* * * * *".into()),
                enabled: true,
                accounts: vec![],
                visibility: None,
                webhook_path: None,
                templates: Default::default(),
                default_template: None,
                middleware: vec![],
                rate_limit: None,
                hmac_secret: None,
                webhook_secret: None,
            },
            vec![],
            Visibility::Public,
        )
    }

    #[tokio::test]
    async fn prepends_title_and_channel_when_present() {
        let mut ctx = base_ctx();
        ctx.scratch.insert("json".to_string(), json!({"title": "Episode 1", "channel": "Aviary Cast"}));
        let stage = YoutubeCaptionStage::new(Config {});
        stage.execute(&mut ctx, Next { remaining: &[] }).await.unwrap();
        assert!(ctx.message.text.starts_with("Episode 1 — new upload from Aviary Cast"));
    }
}
