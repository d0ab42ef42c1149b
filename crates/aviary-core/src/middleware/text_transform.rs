use super::{Next, Stage};
use crate::error::Result;
use crate::types::MessageContext;
use serde::{Deserialize, Serialize};

/// Prepend/append literal text and optionally uppercase the whole message.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub prepend: Option<String>,
    #[serde(default)]
    pub append: Option<String>,
    #[serde(default)]
    pub uppercase: bool,
}

pub struct TextTransformStage {
    config: Config,
}

impl TextTransformStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Stage for TextTransformStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        if let Some(prefix) = &self.config.prepend {
            ctx.message.text = format!("{prefix}{}", ctx.message.text);
        }
        if let Some(suffix) = &self.config.append {
            ctx.message.text.push_str(suffix);
        }
        if self.config.uppercase {
            ctx.message.text = ctx.message.text.to_uppercase();
        }
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, ProviderConfig, ProviderKind, Visibility};

    fn ctx(text: &str) -> MessageContext {
        MessageContext::new(
            Message {
                text: text.to_string(),
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
    async fn applies_prepend_append_and_uppercase_in_order() {
        let stage = TextTransformStage::new(Config {
            prepend: Some("[".into()),
            append: Some("]".into()),
            uppercase: true,
        });
        let mut c = ctx("hi");
        stage.execute(&mut c, Next { remaining: &[] }).await.unwrap();
        assert_eq!(c.message.text, "[HI]");
    }
}
