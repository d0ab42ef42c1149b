//! Dispatch Engine: runs a message through its provider's middleware
//! pipeline, then posts it to every resolved account, isolating failures
//! per account so one broken account never blocks the others.

use crate::accounts::AccountTable;
use crate::error::Result;
use crate::middleware;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::types::{Account, Message, MessageContext, ProviderConfig, Visibility};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The sole external contract the Dispatch Engine depends on: posting a
/// status and verifying credentials against a Mastodon-family or Bluesky
/// backend. Concrete HTTP implementations live outside this crate.
#[async_trait::async_trait]
pub trait RemoteClient: Send + Sync {
    async fn post_status(&self, account: &Account, message: &Message, visibility: Visibility) -> Result<String>;
    async fn verify_credentials(&self, account: &Account) -> Result<()>;
}

/// Outcome of dispatching one message to one account.
#[derive(Debug)]
pub struct AccountDispatchResult {
    pub account_name: String,
    pub result: Result<String>,
}

/// Outcome of dispatching one message across all of its resolved accounts.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub per_account: Vec<AccountDispatchResult>,
}

pub struct Dispatcher {
    accounts: Arc<AccountTable>,
    client: Arc<dyn RemoteClient>,
    push_limiters: Mutex<HashMap<String, RateLimiter>>,
}

impl Dispatcher {
    pub fn new(accounts: Arc<AccountTable>, client: Arc<dyn RemoteClient>) -> Self {
        Self {
            accounts,
            client,
            push_limiters: Mutex::new(HashMap::new()),
        }
    }

    async fn push_provider_rate_limit_ok(&self, provider: &ProviderConfig) -> Result<()> {
        let Some(limit) = &provider.rate_limit else {
            return Ok(());
        };
        let mut limiters = self.push_limiters.lock().await;
        let limiter = limiters
            .entry(provider.name.clone())
            .or_insert_with(|| RateLimiter::new(limit.clone()));
        limiter
            .try_acquire(std::time::Instant::now())
            .map_err(|retry_after| crate::error::Error::RateLimited {
                retry_after_secs: retry_after.as_secs(),
            })
    }

    /// Run the full pipeline for one message and post it to every account
    /// resolved for the provider, in order, isolating per-account errors.
    pub async fn dispatch(&self, message: Message, provider: ProviderConfig, accounts: Vec<String>, visibility: Visibility) -> Result<DispatchOutcome> {
        if provider.is_push() {
            self.push_provider_rate_limit_ok(&provider)?;
        }

        let middleware_configs = provider.middleware.clone();
        let mut ctx = MessageContext::new(message, provider, accounts, visibility);
        middleware::run_pipeline(&middleware_configs, &mut ctx).await?;

        if ctx.skip {
            return Ok(DispatchOutcome {
                skipped: true,
                skip_reason: ctx.skip_reason,
                per_account: Vec::new(),
            });
        }

        let mut per_account = Vec::with_capacity(ctx.accounts.len());
        for account_name in &ctx.accounts {
            let result = match self.accounts.get(account_name).await {
                Ok(account) => self.client.post_status(&account, &ctx.message, ctx.visibility).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                tracing::warn!(account = %account_name, provider = %ctx.provider_name, error = %e, "failed to post to account");
            }
            per_account.push(AccountDispatchResult {
                account_name: account_name.clone(),
                result,
            });
        }

        Ok(DispatchOutcome {
            skipped: false,
            skip_reason: None,
            per_account,
        })
    }
}

/// Test double for `RemoteClient` used by dispatch-path integration tests.
#[cfg(any(test, feature = "test-support"))]
pub struct MockRemoteClient {
    pub posts: Mutex<Vec<(String, String)>>,
    pub fail_accounts: Vec<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl MockRemoteClient {
    pub fn new(fail_accounts: Vec<String>) -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            fail_accounts,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait::async_trait]
impl RemoteClient for MockRemoteClient {
    async fn post_status(&self, account: &Account, message: &Message, _visibility: Visibility) -> Result<String> {
        if self.fail_accounts.contains(&account.name) {
            return Err(crate::error::Error::UpstreamTransient {
                source: account.name.clone(),
                message: "mock failure".to_string(),
            });
        }
        self.posts.lock().await.push((account.name.clone(), message.text.clone()));
        Ok(format!("mock-status-{}", account.name))
    }

    async fn verify_credentials(&self, _account: &Account) -> Result<()> {
        Ok(())
    }
}
