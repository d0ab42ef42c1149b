use super::{Next, Stage};
use crate::error::Result;
use crate::types::MessageContext;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").unwrap());

/// Append a tracking query parameter to every URL found in the message
/// text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub param_name: String,
    pub param_value: String,
}

pub struct UrlTrackingStage {
    config: Config,
}

impl UrlTrackingStage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

fn append_param(url: &str, name: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{name}={value}")
}

#[async_trait::async_trait]
impl Stage for UrlTrackingStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        let config = &self.config;
        ctx.message.text = URL_RE
            .replace_all(&ctx.message.text, |caps: &regex::Captures| {
                append_param(&caps[0], &config.param_name, &config.param_value)
            })
            .into_owned();
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_param_with_question_mark_when_absent() {
        assert_eq!(append_param("https://x.test/a", "utm_source", "aviary"), "https://x.test/a?utm_source=aviary");
    }

    #[test]
    fn appends_param_with_ampersand_when_query_present() {
        assert_eq!(
            append_param("https://x.test/a?b=1", "utm_source", "aviary"),
            "https://x.test/a?b=1&utm_source=aviary"
        );
    }
}
