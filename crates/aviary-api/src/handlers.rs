//! HTTP handlers: liveness probe, the generic `/webhook` endpoint, and
//! per-provider webhook endpoints at each provider's configured
//! `webhook_path`.

use crate::error::ApiError;
use crate::AppState;
use aviary_core::error::Error;
use aviary_core::template::{self, TemplateMode};
use aviary_core::types::{AttachmentConfig, Message, ProviderConfig, WebhookRequest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

pub async fn health_handler() -> StatusCode {
    StatusCode::OK
}

/// `POST /webhook` — the provider is named in the request body.
pub async fn generic_webhook_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WebhookRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let provider_name = body
        .provider
        .clone()
        .ok_or_else(|| Error::Validation("request body must include a 'provider' field".to_string()))?;
    handle_webhook(&state, &provider_name, body).await
}

/// `POST {provider.webhook_path}` — the provider is fixed by the route
/// registration (not extracted per-request), since `webhook_path` is a
/// literal path rather than a templated one. Called from a per-provider
/// closure built in `build_router`.
pub async fn provider_webhook_handler(
    state: Arc<AppState>,
    provider_name: &str,
    body: WebhookRequest,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    handle_webhook(&state, provider_name, body).await
}

async fn handle_webhook(state: &AppState, provider_name: &str, body: WebhookRequest) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let provider = state
        .config
        .providers
        .iter()
        .find(|p| p.name == provider_name)
        .cloned()
        .ok_or_else(|| Error::UnknownProvider(provider_name.to_string()))?;

    if !provider.enabled {
        return Err(Error::Validation(format!("provider '{provider_name}' is disabled")).into());
    }

    let messages = build_messages(&provider, &body)?;
    let accounts = body.accounts.clone().unwrap_or_else(|| provider.accounts.clone());
    let visibility = body.visibility.unwrap_or(provider.visibility.unwrap_or_default());

    let mut warnings = Vec::new();
    let mut dispatched_any = false;
    let mut succeeded_any = false;
    let mut skip_reason = None;

    for message in messages {
        let outcome = state.dispatcher.dispatch(message, provider.clone(), accounts.clone(), visibility).await?;
        if outcome.skipped {
            skip_reason = outcome.skip_reason.or(skip_reason);
            continue;
        }
        dispatched_any = true;
        for result in &outcome.per_account {
            match &result.result {
                Ok(_) => succeeded_any = true,
                Err(e) => warnings.push(format!("{}: {}", result.account_name, e)),
            }
        }
    }

    let timestamp = chrono::Utc::now().to_rfc3339();

    if !dispatched_any {
        return Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": skip_reason.unwrap_or_else(|| "no messages to dispatch".to_string()),
                "timestamp": timestamp,
                "provider": provider_name,
                "accounts": accounts,
            })),
        ));
    }

    let status = if succeeded_any { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    let mut response = json!({
        "success": succeeded_any,
        "message": if succeeded_any { "dispatched" } else { "all accounts failed" },
        "timestamp": timestamp,
        "provider": provider_name,
        "accounts": accounts,
    });
    if !warnings.is_empty() {
        response["warnings"] = json!(warnings);
    }

    Ok((status, Json(response)))
}

/// Resolve the template body to use, in priority order: (a) an inline
/// `template` literal in the request body, (b) `templateName` looked up in
/// the provider's `templates` map, (c) the provider's own default template.
fn resolve_template<'a>(provider: &'a ProviderConfig, body: &'a WebhookRequest) -> Option<&'a str> {
    if let Some(inline) = body.template.as_deref() {
        return Some(inline);
    }
    if let Some(tmpl) = body.template_name.as_deref().and_then(|name| provider.templates.get(name)) {
        return Some(tmpl.as_str());
    }
    provider.default_template.as_deref()
}

/// Build one or more candidate messages from a webhook request. When `json`
/// is present and a template resolves, an array `json` produces one message
/// per element; an object `json` produces a single message. When no
/// template resolves, a literal `message` is used as-is. Anything else is a
/// validation error.
fn build_messages(provider: &ProviderConfig, body: &WebhookRequest) -> Result<Vec<Message>, Error> {
    if let Some(data) = &body.json {
        if let Some(template_str) = resolve_template(provider, body) {
            let attachment_config = body.attachment_config();
            return match data {
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|item| render_message(template_str, item, &attachment_config))
                    .collect(),
                _ => Ok(vec![render_message(template_str, data, &attachment_config)?]),
            };
        }
    }

    if let Some(text) = &body.message {
        let attachments = body
            .json
            .as_ref()
            .map(|json| template::extract_attachments(json, &body.attachment_config()))
            .unwrap_or_default();
        return Ok(vec![Message { text: text.clone(), attachments }]);
    }

    Err(Error::Validation(
        "request has no literal 'message' and no resolvable template".to_string(),
    ))
}

fn render_message(template_str: &str, data: &serde_json::Value, attachment_config: &AttachmentConfig) -> Result<Message, Error> {
    let text = template::render(template_str, data, TemplateMode::Strict)?;
    let attachments = template::extract_attachments(data, attachment_config);
    Ok(Message { text, attachments })
}
