use super::GenerateMessage;
use crate::cache::ProcessedItemCache;
use crate::error::{Error, Result};
use crate::security::is_safe_ip;
use crate::template::{self, TemplateMode};
use crate::types::Message;
use std::net::ToSocketAddrs;
use std::path::PathBuf;

/// Polls an RSS/Atom feed URL on every tick, rendering each new entry
/// through a template and filtering against a processed-item cache keyed by
/// entry ID (falling back to link, then title+published date).
pub struct RssFeedProvider {
    url: String,
    template: String,
    unique_key: String,
    cache: ProcessedItemCache,
    client: reqwest::Client,
}

impl RssFeedProvider {
    pub async fn new(
        provider_name: &str,
        url: String,
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
            url,
            template,
            unique_key,
            cache,
            client: reqwest::Client::new(),
        })
    }

    fn check_host_is_safe(&self) -> Result<()> {
        let parsed = reqwest::Url::parse(&self.url).map_err(|e| Error::Validation(format!("invalid feed URL: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Validation("feed URL has no host".to_string()))?;
        let port = parsed.port_or_known_default().unwrap_or(443);
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::UpstreamTransient {
                source: "rssfeed".to_string(),
                message: format!("DNS resolution failed for {host}: {e}"),
            })?;
        for addr in addrs {
            if !is_safe_ip(&addr.ip()) {
                return Err(Error::Validation(format!("feed host '{host}' resolves to a disallowed address")));
            }
        }
        Ok(())
    }

    /// Decode a raw response body to a UTF-8 string, trying in order: the
    /// HTTP `Content-Type` charset parameter, the XML declaration's
    /// `encoding=`, a byte-order mark, then falling back to UTF-8.
    fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
        if let Some(label) = content_type.and_then(charset_from_content_type) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
                let (decoded, _, had_errors) = encoding.decode(bytes);
                if !had_errors {
                    return decoded.into_owned();
                }
            }
        }
        if let Some(label) = charset_from_xml_declaration(bytes) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
                let (decoded, _, had_errors) = encoding.decode(bytes);
                if !had_errors {
                    return decoded.into_owned();
                }
            }
        }
        let (decoded, _, _) = encoding_rs::UTF_8.decode(bytes);
        decoded.into_owned()
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>> {
        self.check_host_is_safe()?;
        let response = self.client.get(&self.url).send().await.map_err(|e| Error::UpstreamTransient {
            source: "rssfeed".to_string(),
            message: e.to_string(),
        })?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| Error::UpstreamTransient {
            source: "rssfeed".to_string(),
            message: e.to_string(),
        })?;
        let text = Self::decode_body(&bytes, content_type.as_deref());
        parse_feed(&text)
    }
}

struct FeedItem {
    id: String,
    json: serde_json::Value,
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .find_map(|part| part.trim().to_ascii_lowercase().strip_prefix("charset=").map(str::to_string))
}

fn charset_from_xml_declaration(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(200)];
    let head_str = String::from_utf8_lossy(head);
    let start = head_str.find("encoding=")?;
    let rest = &head_str[start + "encoding=".len()..];
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let end = rest[1..].find(quote)?;
    Some(rest[1..1 + end].to_string())
}

fn parse_feed(xml: &str) -> Result<Vec<FeedItem>> {
    let channel = rss::Channel::read_from(xml.as_bytes()).map_err(|e| Error::Validation(format!("invalid RSS feed: {e}")))?;
    Ok(channel
        .items()
        .iter()
        .map(|item| {
            let id = item
                .guid()
                .map(|g| g.value().to_string())
                .or_else(|| item.link().map(str::to_string))
                .unwrap_or_else(|| format!("{}{}", item.title().unwrap_or_default(), item.pub_date().unwrap_or_default()));
            let json = serde_json::json!({
                "title": item.title(),
                "link": item.link(),
                "description": item.description(),
                "pub_date": item.pub_date(),
                "guid": item.guid().map(|g| g.value()),
            });
            FeedItem { id, json }
        })
        .collect())
}

#[async_trait::async_trait]
impl GenerateMessage for RssFeedProvider {
    async fn generate(&mut self) -> Result<Vec<Message>> {
        let items = self.fetch().await?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut messages = Vec::new();
        for item in items {
            let id = if self.unique_key == "id" {
                item.id.clone()
            } else {
                item.json
                    .get(&self.unique_key)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or(item.id.clone())
            };
            if self.cache.contains(&id) {
                continue;
            }
            let text = template::render(&self.template, &item.json, TemplateMode::Lenient)?;
            messages.push(Message {
                text,
                attachments: Vec::new(),
            });
            self.cache.insert(id, now);
        }

        if !messages.is_empty() {
            self.cache.save().await?;
        }

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_from_content_type_header() {
        assert_eq!(
            charset_from_content_type("application/rss+xml; charset=iso-8859-1"),
            Some("iso-8859-1".to_string())
        );
        assert_eq!(charset_from_content_type("application/rss+xml"), None);
    }

    #[test]
    fn charset_from_xml_declaration_text() {
        let xml = r#"<?xml version="1.0" encoding="ISO-8859-1"?><rss></rss>"#;
        assert_eq!(charset_from_xml_declaration(xml.as_bytes()), Some("ISO-8859-1".to_string()));
    }

    #[test]
    fn decode_body_falls_back_to_utf8() {
        let bytes = "plain utf8 body".as_bytes();
        assert_eq!(RssFeedProvider::decode_body(bytes, None), "plain utf8 body");
    }
}
