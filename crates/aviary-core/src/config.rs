//! Configuration parsing and resolution for aviary.

use crate::error::{Error, Result};
use crate::types::{Account, ProviderConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Full configuration for an aviary instance.
#[derive(Debug, Clone, Deserialize)]
pub struct AviaryConfig {
    pub accounts: Vec<Account>,
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

/// Webhook server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub hmac_header: Option<String>,
    #[serde(default)]
    pub hmac_secret: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub ip_allowlist: Vec<String>,
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_webhook_path() -> String {
    "/webhook".to_string()
}
fn default_max_payload_size() -> usize {
    1024 * 1024
}
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
            cors_origins: vec![],
            hmac_header: None,
            hmac_secret: None,
            webhook_secret: None,
            ip_allowlist: vec![],
            max_payload_size: default_max_payload_size(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Secret Manager configuration: retry policy and rotation detection.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    #[serde(default)]
    pub rotation_check_cron: Option<String>,
    #[serde(default)]
    pub reverify_on_rotation: bool,
    #[serde(default)]
    pub aws_region: Option<String>,
}

fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    200
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_cache_max_entries() -> usize {
    1024
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_max_entries: default_cache_max_entries(),
            rotation_check_cron: None,
            reverify_on_rotation: false,
            aws_region: None,
        }
    }
}

/// Wrapper for loading config from file.
pub struct Config;

impl Config {
    pub fn from_path(path: &Path) -> Result<AviaryConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: AviaryConfig = toml::from_str(&content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        validate(&config)?;
        Ok(config)
    }
}

/// Validate cross-references that can't be expressed in serde alone:
/// every account a provider targets must exist, and no provider claims
/// the reserved `/health` webhook path.
fn validate(config: &AviaryConfig) -> Result<()> {
    let account_names: std::collections::HashSet<&str> =
        config.accounts.iter().map(|a| a.name.as_str()).collect();

    for provider in &config.providers {
        for account in &provider.accounts {
            if !account_names.contains(account.as_str()) {
                return Err(Error::Validation(format!(
                    "provider '{}' references unknown account '{}'",
                    provider.name, account
                )));
            }
        }
        if provider.accounts.is_empty() {
            return Err(Error::Validation(format!(
                "provider '{}' has no target accounts",
                provider.name
            )));
        }
        if !provider.is_push() && provider.cron.is_none() {
            return Err(Error::Validation(format!(
                "provider '{}' is not a push provider and has no cron expression",
                provider.name
            )));
        }
        if let Some(path) = &provider.webhook_path {
            if path == "/health" {
                return Err(Error::Validation(format!(
                    "provider '{}' cannot use the reserved webhook path /health",
                    provider.name
                )));
            }
        }
    }
    Ok(())
}

/// Resolve config file path using the resolution order:
/// 1. Explicit path if provided
/// 2. AVIARY_CONFIG env var
/// 3. aviary.toml in current directory
/// 4. Walk up ancestors looking for aviary.toml
/// 5. ~/.config/aviary/config.toml (user default)
/// 6. /etc/aviary/config.toml (system default)
pub fn resolve_config(explicit_path: Option<&Path>) -> Result<AviaryConfig> {
    let mut searched = Vec::new();

    if let Some(path) = explicit_path {
        if path.exists() {
            return Config::from_path(path);
        }
        searched.push(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var("AVIARY_CONFIG") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Config::from_path(&path);
        }
        searched.push(path);
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = Some(cwd.as_path());
        while let Some(d) = dir {
            let config_path = d.join("aviary.toml");
            if config_path.exists() {
                return Config::from_path(&config_path);
            }
            searched.push(config_path);
            dir = d.parent();
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let user_config = config_dir.join("aviary").join("config.toml");
        if user_config.exists() {
            return Config::from_path(&user_config);
        }
        searched.push(user_config);
    }

    let system_config = PathBuf::from("/etc/aviary/config.toml");
    if system_config.exists() {
        return Config::from_path(&system_config);
    }
    searched.push(system_config);

    Err(Error::ConfigNotFound { searched })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn minimal_toml() -> &'static str {
        r#"
[[accounts]]
name = "a1"
backend = "mastodon"
base_url = "https://example.social"
credentials = { access_token = "${TEST_TOKEN}" }

[[providers]]
name = "p1"
kind = "ping"
message = "hello"
accounts = ["a1"]
cron = "*/5 * * * *"
"#
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: AviaryConfig = toml::from_str(minimal_toml()).unwrap();
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validate_rejects_unknown_account() {
        let toml = r#"
[[accounts]]
name = "a1"
backend = "mastodon"
base_url = "https://example.social"
credentials = { access_token = "x" }

[[providers]]
name = "p1"
kind = "ping"
message = "hi"
accounts = ["missing"]
cron = "*/5 * * * *"
"#;
        let config: AviaryConfig = toml::from_str(toml).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_reserved_health_path() {
        let toml = format!(
            "{}\n",
            minimal_toml().replace(
                "cron = \"*/5 * * * *\"",
                "cron = \"*/5 * * * *\"\nwebhook_path = \"/health\""
            )
        );
        let config: AviaryConfig = toml::from_str(&toml).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_non_push_without_cron() {
        let toml = minimal_toml().replace("cron = \"*/5 * * * *\"\n", "");
        let config: AviaryConfig = toml::from_str(&toml).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("aviary.toml");
        std::fs::write(&config_path, minimal_toml()).unwrap();
        let config = Config::from_path(&config_path).unwrap();
        assert_eq!(config.providers[0].name, "p1");
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid toml {{{").unwrap();
        assert!(Config::from_path(&config_path).is_err());
    }
}
