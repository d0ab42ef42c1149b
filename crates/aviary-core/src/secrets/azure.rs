use super::SecretProvider;
use crate::error::{Error, Result};
use serde_json::Value;

const KEYVAULT_API_VERSION: &str = "7.4";

/// `azure://vault/name[?version=V]` — reads a secret from an Azure Key
/// Vault. Authentication is a bearer token from `AZURE_KEYVAULT_TOKEN`;
/// obtaining that token (managed identity, service principal, az-cli login)
/// is out of scope here, the same boundary the dispatch engine draws around
/// `RemoteClient`.
pub struct AzureKeyVaultProvider {
    client: reqwest::Client,
}

impl Default for AzureKeyVaultProvider {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl AzureKeyVaultProvider {
    fn token(&self) -> Result<String> {
        std::env::var("AZURE_KEYVAULT_TOKEN").map_err(|_| Error::Secret {
            provider: self.name().to_string(),
            message: "AZURE_KEYVAULT_TOKEN not configured".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl SecretProvider for AzureKeyVaultProvider {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn can_handle(&self, reference: &str) -> bool {
        reference.starts_with("azure://")
    }

    async fn resolve(&self, reference: &str) -> Result<String> {
        let rest = reference.strip_prefix("azure://").unwrap_or(reference);
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (vault, name) = path.split_once('/').ok_or_else(|| Error::Secret {
            provider: self.name().to_string(),
            message: "expected azure://vault/name".to_string(),
        })?;
        let version = query.split('&').find_map(|kv| kv.strip_prefix("version="));

        let token = self.token()?;
        let mut url = format!("https://{vault}.vault.azure.net/secrets/{name}");
        if let Some(v) = version {
            url.push('/');
            url.push_str(v);
        }
        url.push_str(&format!("?api-version={KEYVAULT_API_VERSION}"));

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::UpstreamTransient {
                source: "azure".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::UpstreamPermanent {
                source: "azure".to_string(),
                message: format!("unexpected status {}", response.status()),
            });
        }

        let body: Value = response.json().await.map_err(|e| Error::Secret {
            provider: self.name().to_string(),
            message: format!("invalid JSON response: {e}"),
        })?;

        body.get("value")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Secret {
                provider: self.name().to_string(),
                message: "response has no 'value' field".to_string(),
            })
    }

    async fn test_connection(&self) -> bool {
        self.token().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_handle_azure_scheme() {
        let p = AzureKeyVaultProvider::default();
        assert!(p.can_handle("azure://my-vault/my-secret"));
        assert!(!p.can_handle("gcp://x"));
    }
}
