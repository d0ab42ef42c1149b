//! Middleware pipeline: an ordered chain of `Stage`s that transform, filter,
//! or delay a `MessageContext` before it reaches the Dispatch Engine.
//!
//! Each stage receives an explicit `Next` continuation rather than capturing
//! one in a closure; a stage that wants to short-circuit the chain (a
//! filter that drops the message, a schedule stage during quiet hours)
//! simply returns without calling `next.run`.

mod attachment;
mod command;
mod conditional;
mod filter;
mod image_description;
mod rate_limit_stage;
mod schedule;
mod template_stage;
mod text_transform;
mod url_tracking;
mod youtube_caption;
mod youtube_shorts_filter;
mod youtube_video_filter;

use crate::error::Result;
use crate::types::MessageContext;
use serde::{Deserialize, Serialize};

/// Configuration for one middleware stage, as written in provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageConfig {
    TextTransform(text_transform::Config),
    Filter(filter::Config),
    Template(template_stage::Config),
    Command(command::Config),
    RateLimit(rate_limit_stage::Config),
    Schedule(schedule::Config),
    Conditional(conditional::Config),
    Attachment(attachment::Config),
    ImageDescription(image_description::Config),
    UrlTracking(url_tracking::Config),
    YoutubeShortsFilter(youtube_shorts_filter::Config),
    YoutubeVideoFilter(youtube_video_filter::Config),
    YoutubeCaption(youtube_caption::Config),
}

/// One step of the pipeline. Implementations must be stateless or hold only
/// `Send + Sync` interior state (rate limiting, caches) since a single
/// instance is shared across concurrent pipeline runs.
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()>;
}

/// The remaining stages of a pipeline run, as an explicit continuation.
pub struct Next<'a> {
    remaining: &'a [Box<dyn Stage>],
}

impl<'a> Next<'a> {
    pub async fn run(self, ctx: &mut MessageContext) -> Result<()> {
        let Some((stage, rest)) = self.remaining.split_first() else {
            return Ok(());
        };
        if ctx.skip {
            return Ok(());
        }
        stage.execute(ctx, Next { remaining: rest }).await
    }
}

/// Build the concrete `Stage` chain for a provider's configured stages, in
/// order.
pub fn build_pipeline(configs: &[StageConfig]) -> Vec<Box<dyn Stage>> {
    configs
        .iter()
        .map(|c| -> Box<dyn Stage> {
            match c {
                StageConfig::TextTransform(cfg) => Box::new(text_transform::TextTransformStage::new(cfg.clone())),
                StageConfig::Filter(cfg) => Box::new(filter::FilterStage::new(cfg.clone())),
                StageConfig::Template(cfg) => Box::new(template_stage::TemplateStage::new(cfg.clone())),
                StageConfig::Command(cfg) => Box::new(command::CommandStage::new(cfg.clone())),
                StageConfig::RateLimit(cfg) => Box::new(rate_limit_stage::RateLimitStage::new(cfg.clone())),
                StageConfig::Schedule(cfg) => Box::new(schedule::ScheduleStage::new(cfg.clone())),
                StageConfig::Conditional(cfg) => Box::new(conditional::ConditionalStage::new(cfg.clone())),
                StageConfig::Attachment(cfg) => Box::new(attachment::AttachmentStage::new(cfg.clone())),
                StageConfig::ImageDescription(cfg) => Box::new(image_description::ImageDescriptionStage::new(cfg.clone())),
                StageConfig::UrlTracking(cfg) => Box::new(url_tracking::UrlTrackingStage::new(cfg.clone())),
                StageConfig::YoutubeShortsFilter(cfg) => {
                    Box::new(youtube_shorts_filter::YoutubeShortsFilterStage::new(cfg.clone()))
                }
                StageConfig::YoutubeVideoFilter(cfg) => {
                    Box::new(youtube_video_filter::YoutubeVideoFilterStage::new(cfg.clone()))
                }
                StageConfig::YoutubeCaption(cfg) => Box::new(youtube_caption::YoutubeCaptionStage::new(cfg.clone())),
            }
        })
        .collect()
}

/// Run the full pipeline built from `configs` against `ctx`.
pub async fn run_pipeline(configs: &[StageConfig], ctx: &mut MessageContext) -> Result<()> {
    let stages = build_pipeline(configs);
    Next { remaining: &stages }.run(ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, ProviderConfig, ProviderKind, Visibility};

    fn make_ctx(text: &str) -> MessageContext {
        let provider = ProviderConfig {
            name: "p".to_string(),
            kind: ProviderKind::Ping {
                message: "x".to_string(),
            },
            cron: Some("* * * * *".to_string()),
            enabled: true,
            accounts: vec!["acc1".to_string()],
            visibility: None,
            webhook_path: None,
            templates: Default::default(),
            default_template: None,
            middleware: Vec::new(),
            rate_limit: None,
            hmac_secret: None,
            webhook_secret: None,
        };
        MessageContext::new(
            Message {
                text: text.to_string(),
                attachments: Vec::new(),
            },
            provider,
            vec!["acc1".to_string()],
            Visibility::Public,
        )
    }

    #[tokio::test]
    async fn empty_pipeline_is_a_no_op() {
        let mut ctx = make_ctx("hello");
        run_pipeline(&[], &mut ctx).await.unwrap();
        assert_eq!(ctx.message.text, "hello");
        assert!(!ctx.skip);
    }

    #[tokio::test]
    async fn filter_short_circuits_remaining_stages() {
        let configs = vec![
            StageConfig::Filter(filter::Config {
                contains: Some("reject-me".to_string()),
                drop_if_matches: true,
            }),
            StageConfig::TextTransform(text_transform::Config {
                prepend: Some("SHOULD-NOT-APPLY: ".to_string()),
                append: None,
                uppercase: false,
            }),
        ];
        let mut ctx = make_ctx("reject-me please");
        run_pipeline(&configs, &mut ctx).await.unwrap();
        assert!(ctx.skip);
        assert!(!ctx.message.text.starts_with("SHOULD-NOT-APPLY"));
    }

    #[tokio::test]
    async fn stages_run_in_configured_order() {
        let configs = vec![
            StageConfig::TextTransform(text_transform::Config {
                prepend: Some("A-".to_string()),
                append: None,
                uppercase: false,
            }),
            StageConfig::TextTransform(text_transform::Config {
                prepend: Some("B-".to_string()),
                append: None,
                uppercase: false,
            }),
        ];
        let mut ctx = make_ctx("x");
        run_pipeline(&configs, &mut ctx).await.unwrap();
        assert_eq!(ctx.message.text, "B-A-x");
    }
}
