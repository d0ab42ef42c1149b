use super::{Next, Stage};
use crate::error::Result;
use crate::template::{self, TemplateMode};
use crate::types::MessageContext;
use serde::{Deserialize, Serialize};

/// Re-render the message text from a named template against the scratch
/// JSON data a provider stashed earlier in the pipeline (under the `"json"`
/// key).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub strict: bool,
}

pub struct TemplateStage {
    config: Config,
}

impl TemplateStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Stage for TemplateStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        let template_str = self
            .config
            .template_name
            .as_deref()
            .and_then(|name| ctx.provider.templates.get(name))
            .or(ctx.provider.default_template.as_ref())
            .cloned();

        if let Some(tmpl) = template_str {
            let data = ctx
                .scratch
                .get("json")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            let mode = if self.config.strict {
                TemplateMode::Strict
            } else {
                TemplateMode::Lenient
            };
            ctx.message.text = template::render(&tmpl, &data, mode)?;
        }
        next.run(ctx).await
    }
}
