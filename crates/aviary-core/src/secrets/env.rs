use super::SecretProvider;
use crate::error::{Error, Result};

/// `${NAME}` — process environment variable.
pub struct EnvSecretProvider;

#[async_trait::async_trait]
impl SecretProvider for EnvSecretProvider {
    fn name(&self) -> &'static str {
        "env"
    }

    fn can_handle(&self, reference: &str) -> bool {
        reference.starts_with("${") && reference.ends_with('}')
    }

    async fn resolve(&self, reference: &str) -> Result<String> {
        let var_name = reference
            .strip_prefix("${")
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| Error::Secret {
                provider: self.name().to_string(),
                message: "malformed ${NAME} reference".to_string(),
            })?;
        std::env::var(var_name).map_err(|_| Error::Secret {
            provider: self.name().to_string(),
            message: format!("environment variable {var_name} not set"),
        })
    }

    async fn test_connection(&self) -> bool {
        true
    }
}
