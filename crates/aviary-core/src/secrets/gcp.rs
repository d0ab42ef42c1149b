use super::SecretProvider;
use crate::error::{Error, Result};
use base64::Engine;
use serde_json::Value;

/// `gcp://project/name[?version=V]` — reads a secret version from Google
/// Secret Manager via `projects/{project}/secrets/{name}/versions/{version|latest}`.
/// Authentication is a bearer token from `GCP_ACCESS_TOKEN`, the same
/// token-injected-by-the-environment boundary `AzureKeyVaultProvider` uses.
pub struct GcpSecretManagerProvider {
    client: reqwest::Client,
}

impl Default for GcpSecretManagerProvider {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl GcpSecretManagerProvider {
    fn token(&self) -> Result<String> {
        std::env::var("GCP_ACCESS_TOKEN").map_err(|_| Error::Secret {
            provider: self.name().to_string(),
            message: "GCP_ACCESS_TOKEN not configured".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl SecretProvider for GcpSecretManagerProvider {
    fn name(&self) -> &'static str {
        "gcp"
    }

    fn can_handle(&self, reference: &str) -> bool {
        reference.starts_with("gcp://")
    }

    async fn resolve(&self, reference: &str) -> Result<String> {
        let rest = reference.strip_prefix("gcp://").unwrap_or(reference);
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (project, name) = path.split_once('/').ok_or_else(|| Error::Secret {
            provider: self.name().to_string(),
            message: "expected gcp://project/name".to_string(),
        })?;
        let version = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("version="))
            .unwrap_or("latest");

        let token = self.token()?;
        let url = format!(
            "https://secretmanager.googleapis.com/v1/projects/{project}/secrets/{name}/versions/{version}:access"
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::UpstreamTransient {
                source: "gcp".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::UpstreamPermanent {
                source: "gcp".to_string(),
                message: format!("unexpected status {}", response.status()),
            });
        }

        let body: Value = response.json().await.map_err(|e| Error::Secret {
            provider: self.name().to_string(),
            message: format!("invalid JSON response: {e}"),
        })?;

        let encoded = body
            .get("payload")
            .and_then(|p| p.get("data"))
            .and_then(|d| d.as_str())
            .ok_or_else(|| Error::Secret {
                provider: self.name().to_string(),
                message: "response has no payload.data field".to_string(),
            })?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Secret {
                provider: self.name().to_string(),
                message: format!("payload.data is not valid base64: {e}"),
            })?;

        String::from_utf8(decoded).map_err(|e| Error::Secret {
            provider: self.name().to_string(),
            message: format!("decoded payload is not valid UTF-8: {e}"),
        })
    }

    async fn test_connection(&self) -> bool {
        self.token().is_ok()
    }
}
