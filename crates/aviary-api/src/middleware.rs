//! Webhook authentication and network-safety middleware: HMAC signature
//! verification (preferred), shared-secret fallback, and an optional IP
//! allowlist. All comparisons run in constant time to avoid leaking secret
//! material through response-latency side channels.

use crate::error::ApiError;
use crate::AppState;
use aviary_core::error::Error;
use aviary_core::security::normalize_ip;
use aviary_core::types::ProviderConfig;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Extension, State};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Marks a route as bound to a specific provider, so `auth_middleware` can
/// look up that provider's own HMAC/shared secret instead of (or before)
/// the global one. Attached as a per-route `Extension` layer by
/// `build_router`'s per-provider routes; absent on the generic `/webhook`
/// route, where the provider is only known once the body is parsed.
#[derive(Debug, Clone)]
pub struct ForcedProvider(pub String);

/// Verify the webhook request's authenticity using the 5-level precedence:
/// provider-specific HMAC, then global HMAC, then provider-specific simple
/// secret, then global simple secret, then no authentication at all.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    forced: Option<Extension<ForcedProvider>>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, state.config.server.max_payload_size)
        .await
        .map_err(|e| Error::Validation(format!("failed to read request body: {e}")))?;

    let provider_name = match forced {
        Some(Extension(ForcedProvider(name))) => Some(name),
        None => serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|v| v.get("provider").and_then(|p| p.as_str().map(str::to_string))),
    };
    let provider = provider_name
        .as_deref()
        .and_then(|name| state.config.providers.iter().find(|p| p.name == name));

    verify_auth(&state, provider, &headers, &bytes)?;

    let request = Request::from_parts(parts, axum::body::Body::from(bytes));
    Ok(next.run(request).await)
}

fn verify_auth(state: &AppState, provider: Option<&ProviderConfig>, headers: &HeaderMap, body: &Bytes) -> Result<(), Error> {
    let hmac_header_name = state.config.server.hmac_header.as_deref().unwrap_or("X-Hub-Signature-256");

    // 1. Provider-specific HMAC.
    if let Some(secret) = provider.and_then(|p| p.hmac_secret.as_deref()) {
        let signature = headers
            .get(hmac_header_name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Authentication("missing HMAC signature header".to_string()))?;
        return verify_hmac(secret, body, signature);
    }

    // 2. Global HMAC.
    if let Some(secret) = &state.config.server.hmac_secret {
        let signature = headers
            .get(hmac_header_name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Authentication("missing HMAC signature header".to_string()))?;
        return verify_hmac(secret, body, signature);
    }

    // 3. Provider-specific simple secret.
    if let Some(secret) = provider.and_then(|p| p.webhook_secret.as_deref()) {
        return verify_shared_secret(secret, headers);
    }

    // 4. Global simple secret.
    if let Some(secret) = &state.config.server.webhook_secret {
        return verify_shared_secret(secret, headers);
    }

    // 5. Nothing configured anywhere; allow the request through.
    tracing::debug!("no authentication configured for this request; allowing");
    Ok(())
}

fn verify_shared_secret(secret: &str, headers: &HeaderMap) -> Result<(), Error> {
    let provided = headers
        .get("X-Webhook-Secret")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Authentication("missing webhook secret header".to_string()))?;
    if provided.as_bytes().ct_eq(secret.as_bytes()).unwrap_u8() != 1 {
        return Err(Error::Authentication("webhook secret mismatch".to_string()));
    }
    Ok(())
}

fn verify_hmac(secret: &str, body: &[u8], signature_header: &str) -> Result<(), Error> {
    let signature_hex = signature_header.strip_prefix("sha256=").unwrap_or(signature_header);
    let provided = hex::decode(signature_hex).map_err(|_| Error::Authentication("malformed HMAC signature".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if expected.as_slice().ct_eq(&provided).unwrap_u8() != 1 {
        return Err(Error::Authentication("HMAC signature mismatch".to_string()));
    }
    Ok(())
}

/// Reject requests from a client IP outside the configured allowlist. A
/// request with no determinable peer address (no `ConnectInfo`) is allowed
/// through only when the allowlist itself is empty.
pub async fn ip_allowlist_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if state.config.server.ip_allowlist.is_empty() {
        return Ok(next.run(request).await);
    }

    let client_ip = normalize_ip(addr.ip());
    let allowed = state
        .config
        .server
        .ip_allowlist
        .iter()
        .any(|entry| entry.parse::<std::net::IpAddr>().map(normalize_ip).map(|a| a == client_ip).unwrap_or(false));

    if !allowed {
        return Err(Error::Authorization(format!("client IP {client_ip} is not in the allowlist")).into());
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_hmac_accepts_matching_signature() {
        let secret = "shh";
        let body = b"hello world";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(verify_hmac(secret, body, &format!("sha256={sig}")).is_ok());
        assert!(verify_hmac(secret, body, &sig).is_ok());
    }

    #[test]
    fn verify_hmac_rejects_wrong_signature() {
        assert!(verify_hmac("shh", b"hello", "sha256=deadbeef").is_err());
    }

    fn push_provider(name: &str, hmac_secret: Option<&str>, webhook_secret: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            kind: aviary_core::types::ProviderKind::Push {
                default_message: None,
                max_length: None,
            },
            cron: None,
            enabled: true,
            accounts: vec!["a1".to_string()],
            visibility: None,
            webhook_path: Some(format!("/hooks/{name}")),
            templates: Default::default(),
            default_template: None,
            middleware: vec![],
            rate_limit: None,
            hmac_secret: hmac_secret.map(str::to_string),
            webhook_secret: webhook_secret.map(str::to_string),
        }
    }

    #[test]
    fn provider_hmac_secret_takes_precedence_over_global() {
        let provider = push_provider("p2", Some("provider-secret"), None);
        let body = Bytes::from_static(b"{}");

        let mut mac = HmacSha256::new_from_slice(b"provider-secret").unwrap();
        mac.update(&body);
        let sig = hex::encode(mac.finalize().into_bytes());

        let mut headers = HeaderMap::new();
        headers.insert("X-Hub-Signature-256", format!("sha256={sig}").parse().unwrap());

        let state = crate::tests_support::state_with_global_hmac_secret("global-secret");
        assert!(verify_auth(&state, Some(&provider), &headers, &body).is_ok());

        // The same body signed with the global secret must NOT satisfy the
        // provider-specific check: the provider's own secret wins outright.
        let mut global_mac = HmacSha256::new_from_slice(b"global-secret").unwrap();
        global_mac.update(&body);
        let global_sig = hex::encode(global_mac.finalize().into_bytes());
        let mut wrong_headers = HeaderMap::new();
        wrong_headers.insert("X-Hub-Signature-256", format!("sha256={global_sig}").parse().unwrap());
        assert!(verify_auth(&state, Some(&provider), &wrong_headers, &body).is_err());
    }

    #[test]
    fn provider_simple_secret_takes_precedence_over_global() {
        let provider = push_provider("p3", None, Some("provider-webhook-secret"));
        let body = Bytes::from_static(b"{}");

        let mut headers = HeaderMap::new();
        headers.insert("X-Webhook-Secret", "provider-webhook-secret".parse().unwrap());

        let state = crate::tests_support::state_with_global_webhook_secret("global-webhook-secret");
        assert!(verify_auth(&state, Some(&provider), &headers, &body).is_ok());

        let mut wrong_headers = HeaderMap::new();
        wrong_headers.insert("X-Webhook-Secret", "global-webhook-secret".parse().unwrap());
        assert!(verify_auth(&state, Some(&provider), &wrong_headers, &body).is_err());
    }

    #[test]
    fn no_auth_configured_allows_request() {
        let provider = push_provider("p4", None, None);
        let state = crate::tests_support::state_with_no_auth();
        let headers = HeaderMap::new();
        let body = Bytes::from_static(b"{}");
        assert!(verify_auth(&state, Some(&provider), &headers, &body).is_ok());
    }
}
