//! Concrete `RemoteClient`: posts to the Mastodon-family REST API or the
//! Bluesky (AT Protocol) XRPC API depending on the target account's
//! backend. Credential verification hits each backend's lightweight
//! "who am I" endpoint.

use aviary_core::dispatch::RemoteClient;
use aviary_core::error::{Error, Result};
use aviary_core::types::{Account, AccountCredentials, BackendKind, Message, Visibility};
use serde_json::json;

pub struct HttpRemoteClient {
    client: reqwest::Client,
}

impl HttpRemoteClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn post_mastodon(&self, account: &Account, message: &Message, visibility: Visibility) -> Result<String> {
        let token = match &account.credentials {
            AccountCredentials::Token { access_token } => access_token.clone(),
            AccountCredentials::Password { .. } => {
                return Err(Error::Authentication(
                    "mastodon backend requires token credentials, not password".to_string(),
                ))
            }
        };

        let url = format!("{}/api/v1/statuses", account.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({
                "status": message.text,
                "visibility": visibility.to_string(),
            }))
            .send()
            .await
            .map_err(|e| Error::UpstreamTransient {
                source: account.name.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let kind = if status.is_client_error() {
                Error::UpstreamPermanent {
                    source: account.name.clone(),
                    message: format!("mastodon returned {status}"),
                }
            } else {
                Error::UpstreamTransient {
                    source: account.name.clone(),
                    message: format!("mastodon returned {status}"),
                }
            };
            return Err(kind);
        }

        let body: serde_json::Value = response.json().await.map_err(|e| Error::UpstreamTransient {
            source: account.name.clone(),
            message: format!("invalid JSON response: {e}"),
        })?;
        Ok(body.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string())
    }

    async fn post_bluesky(&self, account: &Account, message: &Message) -> Result<String> {
        let (identifier, password) = match &account.credentials {
            AccountCredentials::Password { identifier, password } => (identifier.clone(), password.clone()),
            AccountCredentials::Token { .. } => {
                return Err(Error::Authentication(
                    "bluesky backend requires identifier/password credentials, not a bare token".to_string(),
                ))
            }
        };

        let base = account.base_url.trim_end_matches('/');
        let session: serde_json::Value = self
            .client
            .post(format!("{base}/xrpc/com.atproto.server.createSession"))
            .json(&json!({ "identifier": identifier, "password": password }))
            .send()
            .await
            .map_err(|e| Error::UpstreamTransient {
                source: account.name.clone(),
                message: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| Error::UpstreamTransient {
                source: account.name.clone(),
                message: format!("invalid session response: {e}"),
            })?;

        let access_jwt = session
            .get("accessJwt")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Authentication("bluesky session response missing accessJwt".to_string()))?;
        let did = session
            .get("did")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Authentication("bluesky session response missing did".to_string()))?;

        let record = json!({
            "repo": did,
            "collection": "app.bsky.feed.post",
            "record": {
                "text": message.text,
                "createdAt": chrono::Utc::now().to_rfc3339(),
            }
        });

        let response = self
            .client
            .post(format!("{base}/xrpc/com.atproto.repo.createRecord"))
            .bearer_auth(access_jwt)
            .json(&record)
            .send()
            .await
            .map_err(|e| Error::UpstreamTransient {
                source: account.name.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::UpstreamPermanent {
                source: account.name.clone(),
                message: format!("bluesky returned {}", response.status()),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(|e| Error::UpstreamTransient {
            source: account.name.clone(),
            message: format!("invalid JSON response: {e}"),
        })?;
        Ok(body.get("uri").and_then(|v| v.as_str()).unwrap_or_default().to_string())
    }
}

impl Default for HttpRemoteClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn post_status(&self, account: &Account, message: &Message, visibility: Visibility) -> Result<String> {
        match account.backend {
            BackendKind::Mastodon => self.post_mastodon(account, message, visibility).await,
            BackendKind::Bluesky => self.post_bluesky(account, message).await,
        }
    }

    async fn verify_credentials(&self, account: &Account) -> Result<()> {
        match account.backend {
            BackendKind::Mastodon => {
                let token = match &account.credentials {
                    AccountCredentials::Token { access_token } => access_token.clone(),
                    AccountCredentials::Password { .. } => {
                        return Err(Error::Authentication("mastodon backend requires token credentials".to_string()))
                    }
                };
                let url = format!("{}/api/v1/accounts/verify_credentials", account.base_url.trim_end_matches('/'));
                let response = self
                    .client
                    .get(&url)
                    .bearer_auth(token)
                    .send()
                    .await
                    .map_err(|e| Error::UpstreamTransient {
                        source: account.name.clone(),
                        message: e.to_string(),
                    })?;
                if !response.status().is_success() {
                    return Err(Error::Authentication(format!("credential verification failed: {}", response.status())));
                }
                Ok(())
            }
            BackendKind::Bluesky => {
                let (identifier, password) = match &account.credentials {
                    AccountCredentials::Password { identifier, password } => (identifier.clone(), password.clone()),
                    AccountCredentials::Token { .. } => {
                        return Err(Error::Authentication("bluesky backend requires identifier/password credentials".to_string()))
                    }
                };
                let base = account.base_url.trim_end_matches('/');
                let response = self
                    .client
                    .post(format!("{base}/xrpc/com.atproto.server.createSession"))
                    .json(&json!({ "identifier": identifier, "password": password }))
                    .send()
                    .await
                    .map_err(|e| Error::UpstreamTransient {
                        source: account.name.clone(),
                        message: e.to_string(),
                    })?;
                if !response.status().is_success() {
                    return Err(Error::Authentication(format!("credential verification failed: {}", response.status())));
                }
                Ok(())
            }
        }
    }
}
