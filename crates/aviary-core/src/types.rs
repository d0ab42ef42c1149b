//! Domain types shared across the dispatch engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Post visibility, shared by the Mastodon-family and Bluesky backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Public
    }
}

impl std::str::FromStr for Visibility {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "unlisted" => Ok(Visibility::Unlisted),
            "private" => Ok(Visibility::Private),
            "direct" => Ok(Visibility::Direct),
            other => Err(crate::Error::validation(format!(
                "invalid visibility '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
            Visibility::Direct => "direct",
        };
        f.write_str(s)
    }
}

/// Backend kind for a posting account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Mastodon,
    Bluesky,
}

/// Credentials for a posting account. Values here are `SecretReference`
/// strings until resolved by the Secret Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountCredentials {
    Token { access_token: String },
    Password { identifier: String, password: String },
}

/// A named posting identity. Created at config load; credentials may be
/// re-resolved and the whole record swapped atomically when the Secret
/// Manager's rotation detector observes a change (see `accounts::AccountTable`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub backend: BackendKind,
    pub base_url: String,
    pub credentials: AccountCredentials,
    #[serde(default)]
    pub default_visibility: Visibility,
}

/// Which provider kind a `ProviderConfig` describes, plus its kind-specific
/// sub-configuration. Parsed and validated fully at config load time so the
/// process refuses to start on a shape mismatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderKind {
    Ping { message: String },
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default = "default_command_timeout_secs")]
        timeout_secs: u64,
    },
    JsonCommand {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default = "default_command_timeout_secs")]
        timeout_secs: u64,
        template: String,
    },
    MultiJsonCommand {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default = "default_command_timeout_secs")]
        timeout_secs: u64,
        template: String,
        #[serde(default = "default_unique_key")]
        unique_key: String,
        #[serde(default = "default_cache_dir")]
        cache_dir: String,
        #[serde(default = "default_cache_max_size")]
        cache_max_size: usize,
        #[serde(default)]
        cache_ttl_secs: Option<u64>,
    },
    RssFeed {
        url: String,
        template: String,
        #[serde(default = "default_unique_key")]
        unique_key: String,
        #[serde(default = "default_cache_dir")]
        cache_dir: String,
        #[serde(default = "default_cache_max_size")]
        cache_max_size: usize,
        #[serde(default)]
        cache_ttl_secs: Option<u64>,
    },
    Push {
        #[serde(default)]
        default_message: Option<String>,
        #[serde(default)]
        max_length: Option<usize>,
    },
}

fn default_command_timeout_secs() -> u64 {
    30
}
fn default_unique_key() -> String {
    "id".to_string()
}
fn default_cache_dir() -> String {
    "./cache".to_string()
}
fn default_cache_max_size() -> usize {
    10_000
}

/// Configuration for one provider. `name` is the unique key referenced by
/// webhook paths, CLI triggers, and log lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: ProviderKind,
    /// Cron expression; required unless `kind` is `Push`.
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub accounts: Vec<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub webhook_path: Option<String>,
    #[serde(default)]
    pub templates: HashMap<String, String>,
    #[serde(default)]
    pub default_template: Option<String>,
    /// Middleware stages to run for messages from this provider, in order.
    #[serde(default)]
    pub middleware: Vec<crate::middleware::StageConfig>,
    /// Rate limit applied at the push-provider level (distinct from any
    /// `rate_limit` middleware stage configured above).
    #[serde(default)]
    pub rate_limit: Option<crate::rate_limit::RateLimitConfig>,
    #[serde(default)]
    pub hmac_secret: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    pub fn is_push(&self) -> bool {
        matches!(self.kind, ProviderKind::Push { .. })
    }
}

/// A base64 (or raw-bytes) attachment to accompany a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub data: Vec<u8>,
    pub mime_type: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A candidate message produced by a provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Per-message, middleware-scoped context. Exclusively owned by the Dispatch
/// Engine for the lifetime of one message's pipeline run.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub message: Message,
    pub provider_name: String,
    pub provider: ProviderConfig,
    pub accounts: Vec<String>,
    pub visibility: Visibility,
    pub scratch: HashMap<String, serde_json::Value>,
    pub skip: bool,
    pub skip_reason: Option<String>,
    pub ingestion_started_at: Instant,
}

impl MessageContext {
    pub fn new(message: Message, provider: ProviderConfig, accounts: Vec<String>, visibility: Visibility) -> Self {
        Self {
            message,
            provider_name: provider.name.clone(),
            provider,
            accounts,
            visibility,
            scratch: HashMap::new(),
            skip: false,
            skip_reason: None,
            ingestion_started_at: Instant::now(),
        }
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.skip = true;
        self.skip_reason = Some(reason.into());
    }
}

/// Per-field key names for extracting an `Attachment` array out of a JSON
/// object (used by the Template Processor and by webhook requests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    #[serde(default = "default_attachments_key")]
    pub attachments_key: String,
    #[serde(default = "default_data_key")]
    pub data_key: String,
    #[serde(default = "default_mime_type_key")]
    pub mime_type_key: String,
    #[serde(default = "default_filename_key")]
    pub filename_key: String,
    #[serde(default = "default_description_key")]
    pub description_key: String,
}

fn default_attachments_key() -> String {
    "attachments".to_string()
}
fn default_data_key() -> String {
    "data".to_string()
}
fn default_mime_type_key() -> String {
    "mimeType".to_string()
}
fn default_filename_key() -> String {
    "filename".to_string()
}
fn default_description_key() -> String {
    "description".to_string()
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            attachments_key: default_attachments_key(),
            data_key: default_data_key(),
            mime_type_key: default_mime_type_key(),
            filename_key: default_filename_key(),
            description_key: default_description_key(),
        }
    }
}

/// A parsed incoming webhook request (post-validation, pre-dispatch).
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRequest {
    pub provider: Option<String>,
    pub message: Option<String>,
    pub template: Option<String>,
    #[serde(rename = "templateName")]
    pub template_name: Option<String>,
    pub json: Option<serde_json::Value>,
    #[serde(default = "default_unique_key", rename = "uniqueKey")]
    pub unique_key: String,
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, rename = "attachmentsKey")]
    pub attachments_key: Option<String>,
    #[serde(default, rename = "attachmentDataKey")]
    pub attachment_data_key: Option<String>,
    #[serde(default, rename = "attachmentMimeTypeKey")]
    pub attachment_mime_type_key: Option<String>,
    #[serde(default, rename = "attachmentFilenameKey")]
    pub attachment_filename_key: Option<String>,
    #[serde(default, rename = "attachmentDescriptionKey")]
    pub attachment_description_key: Option<String>,
}

impl WebhookRequest {
    pub fn attachment_config(&self) -> AttachmentConfig {
        let defaults = AttachmentConfig::default();
        AttachmentConfig {
            attachments_key: self.attachments_key.clone().unwrap_or(defaults.attachments_key),
            data_key: self.attachment_data_key.clone().unwrap_or(defaults.data_key),
            mime_type_key: self
                .attachment_mime_type_key
                .clone()
                .unwrap_or(defaults.mime_type_key),
            filename_key: self
                .attachment_filename_key
                .clone()
                .unwrap_or(defaults.filename_key),
            description_key: self
                .attachment_description_key
                .clone()
                .unwrap_or(defaults.description_key),
        }
    }
}
