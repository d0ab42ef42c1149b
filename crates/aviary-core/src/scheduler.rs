//! Cron-driven scheduler: validates every non-push provider's cron
//! expression at startup, then ticks each provider's `GenerateMessage`
//! source on its own schedule, handing generated messages to the Dispatch
//! Engine.

use crate::error::{Error, Result};
use crate::providers::GenerateMessage;
use crate::types::{ProviderConfig, Visibility};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Parse and validate a cron expression at config-load time, so a typo
/// surfaces before the process ever starts serving traffic.
pub fn validate_cron(provider_name: &str, expression: &str) -> Result<cron::Schedule> {
    cron::Schedule::from_str(expression).map_err(|e| Error::InvalidCron {
        provider: provider_name.to_string(),
        message: e.to_string(),
    })
}

/// One scheduled provider: its cron schedule, message source, and an
/// in-flight guard so overlapping ticks never run concurrently for the
/// same provider.
pub struct ScheduledProvider {
    pub config: ProviderConfig,
    pub schedule: cron::Schedule,
    pub source: Mutex<Box<dyn GenerateMessage>>,
    in_flight: Mutex<()>,
}

impl ScheduledProvider {
    pub fn new(config: ProviderConfig, schedule: cron::Schedule, source: Box<dyn GenerateMessage>) -> Self {
        Self {
            config,
            schedule,
            source: Mutex::new(source),
            in_flight: Mutex::new(()),
        }
    }

    /// Run one tick if no other tick for this provider is currently
    /// in-flight; silently no-ops otherwise, so only one execution per
    /// provider runs at a time.
    pub async fn try_tick<F, Fut>(&self, on_messages: F) -> Result<bool>
    where
        F: FnOnce(Vec<crate::types::Message>) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!(provider = %self.config.name, "skipping tick: previous run still in flight");
            return Ok(false);
        };
        let mut source = self.source.lock().await;
        let messages = source.generate().await?;
        drop(source);
        if !messages.is_empty() {
            on_messages(messages).await?;
        }
        Ok(true)
    }
}

/// Holds every scheduled (non-push) provider by name.
pub struct Scheduler {
    providers: HashMap<String, Arc<ScheduledProvider>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<ScheduledProvider>) {
        self.providers.insert(provider.config.name.clone(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<ScheduledProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the visibility to dispatch with: the provider's configured
/// visibility overrides the account's own default.
pub fn effective_visibility(provider_visibility: Option<Visibility>, account_default: Visibility) -> Visibility {
    provider_visibility.unwrap_or(account_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl GenerateMessage for CountingSource {
        async fn generate(&mut self) -> Result<Vec<Message>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Message {
                text: "tick".to_string(),
                attachments: Vec::new(),
            }])
        }
    }

    fn provider_config() -> ProviderConfig {
        ProviderConfig {
            name: "p1".to_string(),
            kind: crate::types::ProviderKind::Ping {
                message: "x".to_string(),
            },
            cron: Some("* * * * * *".to_string()),
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
        }
    }

    #[test]
    fn validate_cron_accepts_well_formed_expression() {
        assert!(validate_cron("p1", "0 * * * * *").is_ok());
    }

    #[test]
    fn validate_cron_rejects_malformed_expression() {
        assert!(validate_cron("p1", "not a cron expr").is_err());
    }

    #[tokio::test]
    async fn try_tick_serializes_overlapping_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schedule = validate_cron("p1", "* * * * * *").unwrap();
        let source = Box::new(CountingSource { calls: calls.clone() });
        let provider = Arc::new(ScheduledProvider::new(provider_config(), schedule, source));

        let ran = provider.try_tick(|_msgs| async { Ok(()) }).await.unwrap();
        assert!(ran);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effective_visibility_prefers_provider_override() {
        assert_eq!(effective_visibility(Some(Visibility::Unlisted), Visibility::Public), Visibility::Unlisted);
        assert_eq!(effective_visibility(None, Visibility::Private), Visibility::Private);
    }
}
