use super::{Next, Stage};
use crate::error::Result;
use crate::types::MessageContext;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WATCH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"youtube\.com/watch\?v=|youtu\.be/").unwrap());

/// Keep only messages that link to a standard YouTube video (drops messages
/// with no video link at all, complementing `youtube_shorts_filter` which
/// drops one particular video shape).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {}

pub struct YoutubeVideoFilterStage {
    #[allow(dead_code)]
    config: Config,
}

impl YoutubeVideoFilterStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Stage for YoutubeVideoFilterStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        if !WATCH_RE.is_match(&ctx.message.text) {
            ctx.skip("youtube_video_filter: message has no standard YouTube video link");
            return Ok(());
        }
        next.run(ctx).await
    }
}
