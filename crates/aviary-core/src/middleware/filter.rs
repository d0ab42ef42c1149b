use super::{Next, Stage};
use crate::error::Result;
use crate::types::MessageContext;
use serde::{Deserialize, Serialize};

/// Drop (or keep-only) messages whose text contains a substring.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub contains: Option<String>,
    /// When true, a match drops the message; when false, only matches pass.
    #[serde(default = "default_drop_if_matches")]
    pub drop_if_matches: bool,
}

fn default_drop_if_matches() -> bool {
    true
}

pub struct FilterStage {
    config: Config,
}

impl FilterStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Stage for FilterStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        if let Some(needle) = &self.config.contains {
            let matches = ctx.message.text.contains(needle.as_str());
            let should_drop = matches == self.config.drop_if_matches;
            if should_drop {
                ctx.skip(format!("filter stage dropped message matching '{needle}'"));
                return Ok(());
            }
        }
        next.run(ctx).await
    }
}
