//! Template Processor: substitutes `{{path}}` / `${path}` placeholders from
//! a JSON value into a message template, and extracts attachment arrays out
//! of the same JSON shape.

use crate::error::{Error, Result};
use crate::types::{Attachment, AttachmentConfig};
use base64::Engine;
use serde_json::Value;

/// Strict mode fails the whole render when a placeholder can't be resolved;
/// lenient mode substitutes an empty string and keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateMode {
    Strict,
    Lenient,
}

/// Render `template` by replacing every `{{path}}` or `${path}` run with the
/// value found at `path` in `data`. Paths are dot-separated with optional
/// `[n]` or bare numeric segments for array indexing, e.g. `item.tags.0` or
/// `item.tags[0]`.
pub fn render(template: &str, data: &Value, mode: TemplateMode) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if let Some((path, consumed)) = match_placeholder(&template[i..]) {
            match lookup(data, &path) {
                Some(value) => out.push_str(&value),
                None if mode == TemplateMode::Lenient => {}
                None => {
                    return Err(Error::Template(format!("unresolved placeholder '{path}'")));
                }
            }
            i += consumed;
        } else {
            let ch = template[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    Ok(out)
}

/// Try to match a placeholder starting at the beginning of `s`. Returns the
/// path string and the number of bytes consumed (including delimiters).
fn match_placeholder(s: &str) -> Option<(String, usize)> {
    if let Some(rest) = s.strip_prefix("{{") {
        let end = rest.find("}}")?;
        let path = rest[..end].trim().to_string();
        return Some((path, end + 4));
    }
    if let Some(rest) = s.strip_prefix("${") {
        let end = rest.find('}')?;
        let path = rest[..end].trim().to_string();
        return Some((path, end + 3));
    }
    None
}

/// Resolve a dot/bracket path against a JSON value. A bare numeric segment
/// or a `[n]` suffix both index into arrays; anything else indexes into
/// objects. Non-string leaf values are rendered with their natural display
/// form rather than their JSON-quoted form.
fn lookup(data: &Value, path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    let mut current = data;
    for raw_segment in path.split('.') {
        for segment in split_brackets(raw_segment) {
            current = match segment {
                Segment::Key(key) => current.get(key)?,
                Segment::Index(idx) => current.get(idx)?,
            };
        }
    }
    Some(scalar_to_string(current))
}

enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Split a path segment like `tags[0]` into `Key("tags")`, `Index(0)`; a bare
/// segment like `3` becomes a single `Index(3)`; anything else is a key.
fn split_brackets(raw: &str) -> Vec<Segment<'_>> {
    if let Ok(idx) = raw.parse::<usize>() {
        return vec![Segment::Index(idx)];
    }
    let mut parts = Vec::new();
    let mut rest = raw;
    if let Some(bracket_pos) = rest.find('[') {
        let (key, tail) = rest.split_at(bracket_pos);
        if !key.is_empty() {
            parts.push(Segment::Key(key));
        }
        rest = tail;
        while let Some(stripped) = rest.strip_prefix('[') {
            if let Some(close) = stripped.find(']') {
                if let Ok(idx) = stripped[..close].parse::<usize>() {
                    parts.push(Segment::Index(idx));
                }
                rest = &stripped[close + 1..];
            } else {
                break;
            }
        }
    } else {
        parts.push(Segment::Key(rest));
    }
    parts
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pull an `Attachment` array out of `data` using the key names in `config`.
/// Each attachment entry must carry base64-encoded bytes under `data_key`;
/// entries that fail to decode are dropped rather than failing the whole
/// extraction, since one malformed attachment shouldn't block the message.
pub fn extract_attachments(data: &Value, config: &AttachmentConfig) -> Vec<Attachment> {
    let Some(entries) = data.get(&config.attachments_key).and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let encoded = entry.get(&config.data_key)?.as_str()?;
            let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
            let mime_type = entry
                .get(&config.mime_type_key)
                .and_then(|v| v.as_str())
                .unwrap_or("application/octet-stream")
                .to_string();
            let filename = entry
                .get(&config.filename_key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            let description = entry
                .get(&config.description_key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            Some(Attachment {
                data: bytes,
                mime_type,
                filename,
                description,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_simple_dot_path() {
        let data = json!({"user": {"name": "Ada"}});
        assert_eq!(render("hi {{user.name}}", &data, TemplateMode::Strict).unwrap(), "hi Ada");
    }

    #[test]
    fn renders_dollar_brace_form() {
        let data = json!({"x": "y"});
        assert_eq!(render("v=${x}", &data, TemplateMode::Strict).unwrap(), "v=y");
    }

    #[test]
    fn renders_array_index_bracket_and_bare() {
        let data = json!({"tags": ["a", "b", "c"]});
        assert_eq!(render("{{tags[1]}}", &data, TemplateMode::Strict).unwrap(), "b");
        assert_eq!(render("{{tags.2}}", &data, TemplateMode::Strict).unwrap(), "c");
    }

    #[test]
    fn strict_mode_fails_on_missing_path() {
        let data = json!({});
        assert!(render("{{missing}}", &data, TemplateMode::Strict).is_err());
    }

    #[test]
    fn lenient_mode_substitutes_empty_on_missing_path() {
        let data = json!({});
        assert_eq!(render("[{{missing}}]", &data, TemplateMode::Lenient).unwrap(), "[]");
    }

    #[test]
    fn renders_numeric_leaf_via_natural_display() {
        let data = json!({"count": 5});
        assert_eq!(render("n={{count}}", &data, TemplateMode::Strict).unwrap(), "n=5");
    }

    #[test]
    fn extract_attachments_decodes_base64_and_drops_malformed() {
        let config = AttachmentConfig::default();
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"hello");
        let data = json!({
            "attachments": [
                {"data": encoded, "mimeType": "text/plain", "filename": "a.txt"},
                {"data": "not-valid-base64!!", "mimeType": "text/plain"},
            ]
        });
        let attachments = extract_attachments(&data, &config);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].data, b"hello");
        assert_eq!(attachments[0].filename.as_deref(), Some("a.txt"));
    }

    #[test]
    fn extract_attachments_empty_when_key_absent() {
        let config = AttachmentConfig::default();
        let data = json!({"other": "field"});
        assert!(extract_attachments(&data, &config).is_empty());
    }
}
