//! Secret Manager: resolves opaque secret references to plaintext, with
//! TTL caching, LRU eviction, retry-with-backoff, and rotation detection.
//!
//! Providers are tried in a fixed order; the first one that recognizes a
//! reference's scheme resolves it.

mod aws;
mod azure;
mod env;
mod file;
mod gcp;
mod vault;

pub use aws::AwsSecretsProvider;
pub use azure::AzureKeyVaultProvider;
pub use env::EnvSecretProvider;
pub use file::FileSecretProvider;
pub use gcp::GcpSecretManagerProvider;
pub use vault::VaultSecretProvider;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A scheme-prefixed string resolving to plaintext via a provider chain.
pub type SecretReference = String;

/// Plaintext value plus resolution metadata.
#[derive(Debug, Clone)]
pub struct SecretResult {
    pub value: String,
    pub source: String,
    pub provider_name: String,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub cached: bool,
}

/// A single secret backend. Providers are tried in registration order;
/// the first whose `can_handle` returns true resolves the reference.
#[async_trait::async_trait]
pub trait SecretProvider: Send + Sync {
    /// Stable name used in error messages and masked log lines.
    fn name(&self) -> &'static str;

    /// Whether this provider recognizes the reference's scheme.
    fn can_handle(&self, reference: &str) -> bool;

    /// Resolve the reference to plaintext. Implementations should not retry
    /// internally — the `SecretManager` owns the retry policy so every
    /// backend gets uniform behavior.
    async fn resolve(&self, reference: &str) -> Result<String>;

    /// Non-destructive connectivity probe for `TestConnections`.
    async fn test_connection(&self) -> bool;
}

struct CacheEntry {
    result: SecretResult,
    created_at: DateTime<Utc>,
}

/// Configuration for the manager's retry policy and cache.
#[derive(Debug, Clone)]
pub struct SecretManagerOptions {
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
}

impl Default for SecretManagerOptions {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_backoff_ms: 200,
            cache_ttl_secs: 300,
            cache_max_entries: 1024,
        }
    }
}

/// Resolves secret references via a fixed provider chain, with a shared
/// TTL+LRU cache. Exclusively owns its cache and rotation-detector state.
pub struct SecretManager {
    providers: Vec<Arc<dyn SecretProvider>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    options: SecretManagerOptions,
    last_fingerprints: Mutex<HashMap<String, String>>,
}

impl SecretManager {
    pub fn new(providers: Vec<Arc<dyn SecretProvider>>, options: SecretManagerOptions) -> Self {
        Self {
            providers,
            cache: Mutex::new(HashMap::new()),
            options,
            last_fingerprints: Mutex::new(HashMap::new()),
        }
    }

    /// Build the default provider chain in its fixed registration order:
    /// env, file, vault, aws, azure, gcp.
    pub fn with_default_providers(options: SecretManagerOptions, aws_region: Option<String>) -> Self {
        let providers: Vec<Arc<dyn SecretProvider>> = vec![
            Arc::new(EnvSecretProvider),
            Arc::new(FileSecretProvider),
            Arc::new(VaultSecretProvider::from_env()),
            Arc::new(AwsSecretsProvider::new(aws_region)),
            Arc::new(AzureKeyVaultProvider),
            Arc::new(GcpSecretManagerProvider),
        ];
        Self::new(providers, options)
    }

    fn find_provider(&self, reference: &str) -> Result<&Arc<dyn SecretProvider>> {
        self.providers
            .iter()
            .find(|p| p.can_handle(reference))
            .ok_or_else(|| Error::NoSecretProvider {
                scheme: scheme_of(reference),
            })
    }

    /// Resolve a reference to plaintext, consulting the cache first.
    pub async fn resolve(&self, reference: &str) -> Result<SecretResult> {
        let ttl = chrono::Duration::seconds(self.options.cache_ttl_secs as i64);

        {
            let mut cache = self.cache.lock().await;
            if let Some(entry) = cache.get_mut(reference) {
                if Utc::now() - entry.created_at < ttl {
                    entry.result.access_count += 1;
                    entry.result.last_accessed = Utc::now();
                    entry.result.cached = true;
                    return Ok(entry.result.clone());
                } else {
                    cache.remove(reference);
                }
            }
        }

        let provider = self.find_provider(reference)?;
        let provider_name = provider.name();

        let mut last_err = None;
        for attempt in 0..self.options.retry_attempts {
            match provider.resolve(reference).await {
                Ok(value) => {
                    let result = SecretResult {
                        value,
                        source: mask_reference(reference),
                        provider_name: provider_name.to_string(),
                        last_accessed: Utc::now(),
                        access_count: 1,
                        cached: false,
                    };
                    self.insert_cache(reference.to_string(), result.clone()).await;
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider_name,
                        reference = %mask_reference(reference),
                        attempt = attempt + 1,
                        error = %e,
                        "secret resolution attempt failed"
                    );
                    last_err = Some(e);
                    if attempt + 1 < self.options.retry_attempts {
                        let backoff = self.options.retry_backoff_ms * 2u64.pow(attempt);
                        tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                    }
                }
            }
        }

        Err(Error::Secret {
            provider: provider_name.to_string(),
            message: last_err.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    async fn insert_cache(&self, reference: String, result: SecretResult) {
        let mut cache = self.cache.lock().await;
        if cache.len() >= self.options.cache_max_entries && !cache.contains_key(&reference) {
            if let Some(oldest_key) = cache
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                cache.remove(&oldest_key);
            }
        }
        cache.insert(
            reference,
            CacheEntry {
                result,
                created_at: Utc::now(),
            },
        );
    }

    /// Probe each registered provider non-destructively.
    pub async fn test_connections(&self) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for provider in &self.providers {
            results.insert(provider.name().to_string(), provider.test_connection().await);
        }
        results
    }

    /// Re-resolve `reference` and compare its fingerprint (SHA-256 of the
    /// plaintext) against the last-seen fingerprint. Returns `true` if this
    /// is the first observation or the value is unchanged; `false` if the
    /// value rotated.
    pub async fn check_rotation(&self, reference: &str) -> Result<RotationCheck> {
        // Bypass the cache — rotation detection must observe the live value.
        let provider = self.find_provider(reference)?;
        let value = provider.resolve(reference).await?;
        let fingerprint = fingerprint(&value);

        let mut fingerprints = self.last_fingerprints.lock().await;
        let previous = fingerprints.insert(reference.to_string(), fingerprint.clone());

        {
            let mut cache = self.cache.lock().await;
            cache.remove(reference);
        }

        Ok(match previous {
            None => RotationCheck::FirstObservation,
            Some(prev) if prev == fingerprint => RotationCheck::Unchanged,
            Some(_) => RotationCheck::Rotated { new_value: value },
        })
    }
}

#[derive(Debug)]
pub enum RotationCheck {
    FirstObservation,
    Unchanged,
    Rotated { new_value: String },
}

fn fingerprint(value: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(value.as_bytes()))
}

fn scheme_of(reference: &str) -> String {
    if reference.starts_with("${") {
        return "${...}".to_string();
    }
    reference
        .split_once("://")
        .map(|(scheme, _)| scheme.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Mask a reference for logging: for URL-shaped references, keep
/// scheme/host/path and drop the query string; for opaque strings longer
/// than 10 characters, keep the first 5 and last 5 characters.
pub fn mask_reference(reference: &str) -> String {
    if let Some((scheme, rest)) = reference.split_once("://") {
        let path_only = rest.split('?').next().unwrap_or(rest);
        return format!("{scheme}://{path_only}");
    }
    if reference.len() > 10 {
        let first: String = reference.chars().take(5).collect();
        let last: String = reference.chars().rev().take(5).collect::<String>().chars().rev().collect();
        return format!("{first}...{last}");
    }
    "***".to_string()
}
