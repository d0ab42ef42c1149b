use super::{Next, Stage};
use crate::error::Result;
use crate::types::MessageContext;
use serde::{Deserialize, Serialize};

/// Continue the pipeline only if a scratch JSON field equals an expected
/// value; otherwise skip the message. The field path uses the same
/// dot-notation as the Template Processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub field: String,
    pub equals: serde_json::Value,
}

pub struct ConditionalStage {
    config: Config,
}

impl ConditionalStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Stage for ConditionalStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        let data = ctx.scratch.get("json").cloned().unwrap_or(serde_json::Value::Null);
        let mut current = &data;
        let mut matched = true;
        for segment in self.config.field.split('.') {
            match current.get(segment) {
                Some(v) => current = v,
                None => {
                    matched = false;
                    break;
                }
            }
        }
        if !matched || *current != self.config.equals {
            ctx.skip(format!(
                "conditional stage: field '{}' did not equal expected value",
                self.config.field
            ));
            return Ok(());
        }
        next.run(ctx).await
    }
}
