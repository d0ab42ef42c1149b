use super::SecretProvider;
use crate::error::{Error, Result};
use serde_json::Value;

const WELL_KNOWN_FIELDS: &[&str] = &["value", "password", "token", "secret"];

/// `vault://path[?key=field]` — reads a secret at a path from a HashiCorp
/// Vault server. Connection info (`VAULT_ADDR`, `VAULT_TOKEN`) comes from
/// the process environment, mirroring the pack's `ratewatch` config
/// manager's `VAULT_ADDR`-gated source registration.
pub struct VaultSecretProvider {
    addr: Option<String>,
    token: Option<String>,
    client: reqwest::Client,
}

impl VaultSecretProvider {
    pub fn from_env() -> Self {
        Self {
            addr: std::env::var("VAULT_ADDR").ok(),
            token: std::env::var("VAULT_TOKEN").ok(),
            client: reqwest::Client::new(),
        }
    }

    #[cfg(test)]
    pub fn with_addr(addr: String, token: String) -> Self {
        Self {
            addr: Some(addr),
            token: Some(token),
            client: reqwest::Client::new(),
        }
    }

    fn addr(&self) -> Result<&str> {
        self.addr.as_deref().ok_or_else(|| Error::Secret {
            provider: self.name().to_string(),
            message: "VAULT_ADDR not configured".to_string(),
        })
    }

    fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| Error::Secret {
            provider: self.name().to_string(),
            message: "VAULT_TOKEN not configured".to_string(),
        })
    }
}

/// Select a field from a Vault secret payload: explicit `key` wins, then the
/// sole field if there is exactly one, then the first of the well-known
/// field names, else fail.
pub(super) fn select_field(data: &serde_json::Map<String, Value>, explicit_key: Option<&str>) -> Result<String> {
    if let Some(key) = explicit_key {
        return data
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Secret {
                provider: "vault".to_string(),
                message: format!("key '{key}' not present in secret data"),
            });
    }
    if data.len() == 1 {
        if let Some((_, v)) = data.iter().next() {
            if let Some(s) = v.as_str() {
                return Ok(s.to_string());
            }
        }
    }
    for field in WELL_KNOWN_FIELDS {
        if let Some(v) = data.get(*field).and_then(|v| v.as_str()) {
            return Ok(v.to_string());
        }
    }
    Err(Error::Secret {
        provider: "vault".to_string(),
        message: "no explicit key, no sole field, and no well-known field present".to_string(),
    })
}

#[async_trait::async_trait]
impl SecretProvider for VaultSecretProvider {
    fn name(&self) -> &'static str {
        "vault"
    }

    fn can_handle(&self, reference: &str) -> bool {
        reference.starts_with("vault://")
    }

    async fn resolve(&self, reference: &str) -> Result<String> {
        let rest = reference.strip_prefix("vault://").unwrap_or(reference);
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let key = query.split('&').find_map(|kv| kv.strip_prefix("key="));

        let addr = self.addr()?;
        let token = self.token()?;
        let url = format!("{}/v1/{}", addr.trim_end_matches('/'), path.trim_start_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("X-Vault-Token", token)
            .send()
            .await
            .map_err(|e| Error::UpstreamTransient {
                source: "vault".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::UpstreamPermanent {
                source: "vault".to_string(),
                message: format!("unexpected status {}", response.status()),
            });
        }

        let body: Value = response.json().await.map_err(|e| Error::Secret {
            provider: self.name().to_string(),
            message: format!("invalid JSON response: {e}"),
        })?;

        // KV v2 nests the fields under data.data; KV v1 puts them at data.
        let data_obj = body
            .get("data")
            .and_then(|d| d.get("data").or(Some(d)))
            .and_then(|d| d.as_object())
            .ok_or_else(|| Error::Secret {
                provider: self.name().to_string(),
                message: "response has no usable data object".to_string(),
            })?;

        select_field(data_obj, key)
    }

    async fn test_connection(&self) -> bool {
        let (Ok(addr), Ok(token)) = (self.addr(), self.token()) else {
            return false;
        };
        let url = format!("{}/v1/sys/health", addr.trim_end_matches('/'));
        self.client
            .get(&url)
            .header("X-Vault-Token", token)
            .send()
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn can_handle_vault_scheme() {
        let p = VaultSecretProvider::from_env();
        assert!(p.can_handle("vault://secret/data/foo"));
        assert!(!p.can_handle("aws://x"));
    }

    #[test]
    fn select_field_uses_explicit_key() {
        let data = json!({"password": "p1", "other": "o1"}).as_object().unwrap().clone();
        assert_eq!(select_field(&data, Some("other")).unwrap(), "o1");
    }

    #[test]
    fn select_field_uses_sole_field() {
        let data = json!({"anything": "val"}).as_object().unwrap().clone();
        assert_eq!(select_field(&data, None).unwrap(), "val");
    }

    #[test]
    fn select_field_falls_back_to_well_known() {
        let data = json!({"foo": "bar", "token": "t1"}).as_object().unwrap().clone();
        assert_eq!(select_field(&data, None).unwrap(), "t1");
    }

    #[test]
    fn select_field_fails_without_match() {
        let data = json!({"foo": "bar", "baz": "qux"}).as_object().unwrap().clone();
        assert!(select_field(&data, None).is_err());
    }
}
