use super::{Next, Stage};
use crate::error::Result;
use crate::types::MessageContext;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SHORTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"youtube\.com/shorts/").unwrap());

/// Drop messages linking to a YouTube Shorts URL.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {}

pub struct YoutubeShortsFilterStage {
    #[allow(dead_code)]
    config: Config,
}

impl YoutubeShortsFilterStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Stage for YoutubeShortsFilterStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        if SHORTS_RE.is_match(&ctx.message.text) {
            ctx.skip("youtube_shorts_filter: message links to a YouTube Shorts URL");
            return Ok(());
        }
        next.run(ctx).await
    }
}
