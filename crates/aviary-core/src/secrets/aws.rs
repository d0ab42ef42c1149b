use super::SecretProvider;
use crate::error::{Error, Result};
use tokio::sync::OnceCell;

/// `aws://name[?key=field&region=R]` — reads a secret from AWS Secrets
/// Manager. When the stored secret is a JSON object, `key` selects a field;
/// when absent and the object has exactly one field, that field is used.
/// Plain-string secrets are returned as-is. Region defaults to the value
/// passed at construction (from config), falling back to the SDK's own
/// environment/profile resolution.
pub struct AwsSecretsProvider {
    default_region: Option<String>,
    client: OnceCell<aws_sdk_secretsmanager::Client>,
}

impl AwsSecretsProvider {
    pub fn new(default_region: Option<String>) -> Self {
        Self {
            default_region,
            client: OnceCell::new(),
        }
    }

    async fn client_for(&self, region_override: Option<String>) -> aws_sdk_secretsmanager::Client {
        if let Some(region) = region_override {
            let config = aws_config::from_env()
                .region(aws_config::Region::new(region))
                .load()
                .await;
            return aws_sdk_secretsmanager::Client::new(&config);
        }
        self.client
            .get_or_init(|| async {
                let mut loader = aws_config::from_env();
                if let Some(region) = &self.default_region {
                    loader = loader.region(aws_config::Region::new(region.clone()));
                }
                let config = loader.load().await;
                aws_sdk_secretsmanager::Client::new(&config)
            })
            .await
            .clone()
    }
}

fn parse_query(query: &str) -> (Option<&str>, Option<String>) {
    let mut key = None;
    let mut region = None;
    for kv in query.split('&').filter(|s| !s.is_empty()) {
        if let Some(v) = kv.strip_prefix("key=") {
            key = Some(v);
        } else if let Some(v) = kv.strip_prefix("region=") {
            region = Some(v.to_string());
        }
    }
    (key, region)
}

fn extract_value(secret_string: &str, key: Option<&str>) -> Result<String> {
    match serde_json::from_str::<serde_json::Value>(secret_string) {
        Ok(serde_json::Value::Object(map)) => {
            if let Some(k) = key {
                map.get(k)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| Error::Secret {
                        provider: "aws".to_string(),
                        message: format!("key '{k}' not present in secret JSON"),
                    })
            } else if map.len() == 1 {
                Ok(map.values().next().and_then(|v| v.as_str()).map(|s| s.to_string()).unwrap_or_default())
            } else {
                Err(Error::Secret {
                    provider: "aws".to_string(),
                    message: "secret is a multi-field JSON object; a key is required".to_string(),
                })
            }
        }
        _ => Ok(secret_string.to_string()),
    }
}

#[async_trait::async_trait]
impl SecretProvider for AwsSecretsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn can_handle(&self, reference: &str) -> bool {
        reference.starts_with("aws://")
    }

    async fn resolve(&self, reference: &str) -> Result<String> {
        let rest = reference.strip_prefix("aws://").unwrap_or(reference);
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (key, region) = parse_query(query);

        let client = self.client_for(region).await;
        let output = client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| Error::UpstreamTransient {
                source: "aws".to_string(),
                message: e.to_string(),
            })?;

        let secret_string = output.secret_string().ok_or_else(|| Error::Secret {
            provider: self.name().to_string(),
            message: "secret has no string payload (binary secrets are unsupported)".to_string(),
        })?;

        extract_value(secret_string, key)
    }

    async fn test_connection(&self) -> bool {
        let client = self.client_for(None).await;
        client.list_secrets().max_results(1).send().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_handle_aws_scheme() {
        let p = AwsSecretsProvider::new(None);
        assert!(p.can_handle("aws://my-secret"));
        assert!(!p.can_handle("vault://x"));
    }

    #[test]
    fn parse_query_extracts_key_and_region() {
        assert_eq!(parse_query("key=token&region=eu-west-1"), (Some("token"), Some("eu-west-1".to_string())));
        assert_eq!(parse_query(""), (None, None));
    }

    #[test]
    fn extract_value_plain_string() {
        assert_eq!(extract_value("hunter2", None).unwrap(), "hunter2");
    }

    #[test]
    fn extract_value_json_with_explicit_key() {
        assert_eq!(extract_value(r#"{"token":"abc","user":"x"}"#, Some("token")).unwrap(), "abc");
    }

    #[test]
    fn extract_value_json_sole_field() {
        assert_eq!(extract_value(r#"{"only":"v1"}"#, None).unwrap(), "v1");
    }

    #[test]
    fn extract_value_json_multi_field_without_key_fails() {
        assert!(extract_value(r#"{"a":"1","b":"2"}"#, None).is_err());
    }
}
