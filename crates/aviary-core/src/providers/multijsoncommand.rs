use super::command::CommandProvider;
use super::GenerateMessage;
use crate::cache::ProcessedItemCache;
use crate::error::{Error, Result};
use crate::template::{self, TemplateMode};
use crate::types::Message;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Runs an external command whose stdout is parsed as a JSON array of
/// items; each item is rendered through a template and filtered against a
/// processed-item cache keyed by `unique_key`, so the same item is never
/// posted twice across ticks.
pub struct MultiJsonCommandProvider {
    command: CommandProvider,
    template: String,
    unique_key: String,
    cache: ProcessedItemCache,
}

impl MultiJsonCommandProvider {
    pub async fn new(
        provider_name: &str,
        command: String,
        args: Vec<String>,
        cwd: Option<String>,
        env: HashMap<String, String>,
        timeout_secs: u64,
        template: String,
        unique_key: String,
        cache_dir: String,
        cache_max_size: usize,
        cache_ttl_secs: Option<u64>,
    ) -> Result<Self> {
        let cache = ProcessedItemCache::load(
            &PathBuf::from(cache_dir),
            provider_name,
            cache_max_size,
            cache_ttl_secs,
        )
        .await?;
        Ok(Self {
            command: CommandProvider::new(command, args, cwd, env, timeout_secs),
            template,
            unique_key,
            cache,
        })
    }
}

#[async_trait::async_trait]
impl GenerateMessage for MultiJsonCommandProvider {
    async fn generate(&mut self) -> Result<Vec<Message>> {
        let raw = self.command.run().await?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let items: Vec<serde_json::Value> = serde_json::from_str(&raw)
            .map_err(|e| Error::Validation(format!("multijsoncommand output is not a JSON array: {e}")))?;

        let mut seen_this_batch = HashSet::new();
        let mut messages = Vec::new();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        for item in &items {
            let id = item
                .get(&self.unique_key)
                .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
                .ok_or_else(|| Error::Validation(format!("item missing unique key '{}'", self.unique_key)))?;

            if !seen_this_batch.insert(id.clone()) {
                return Err(Error::LocalFatal(format!(
                    "duplicate id '{id}' within a single multijsoncommand batch"
                )));
            }

            if self.cache.contains(&id) {
                continue;
            }

            let text = template::render(&self.template, item, TemplateMode::Strict)?;
            let attachments = template::extract_attachments(item, &Default::default());
            messages.push(Message { text, attachments });
            self.cache.insert(id, now);
        }

        if !messages.is_empty() {
            self.cache.save().await?;
        }

        Ok(messages)
    }
}
