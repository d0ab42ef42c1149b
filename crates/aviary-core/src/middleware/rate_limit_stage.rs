use super::{Next, Stage};
use crate::error::{Error, Result};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::types::MessageContext;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub limit: RateLimitConfig,
}

/// Per-provider sliding-window limiter applied as a pipeline stage, distinct
/// from `ProviderConfig::rate_limit` which governs push providers directly.
pub struct RateLimitStage {
    limiter: Mutex<RateLimiter>,
}

impl RateLimitStage {
    pub fn new(config: Config) -> Self {
        Self {
            limiter: Mutex::new(RateLimiter::new(config.limit)),
        }
    }
}

#[async_trait::async_trait]
impl Stage for RateLimitStage {
    async fn execute<'a>(&'a self, ctx: &'a mut MessageContext, next: Next<'a>) -> Result<()> {
        let mut limiter = self.limiter.lock().await;
        match limiter.try_acquire(Instant::now()) {
            Ok(()) => {
                drop(limiter);
                next.run(ctx).await
            }
            Err(retry_after) => Err(Error::RateLimited {
                retry_after_secs: retry_after.as_secs(),
            }),
        }
    }
}
