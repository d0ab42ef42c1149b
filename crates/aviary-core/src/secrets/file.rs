use super::SecretProvider;
use crate::error::{Error, Result};

/// `file://path` — reads a file, trimming trailing whitespace. Path may be
/// absolute or relative to the process's working directory.
pub struct FileSecretProvider;

#[async_trait::async_trait]
impl SecretProvider for FileSecretProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn can_handle(&self, reference: &str) -> bool {
        reference.starts_with("file://")
    }

    async fn resolve(&self, reference: &str) -> Result<String> {
        let path = reference.strip_prefix("file://").unwrap_or(reference);
        let content = tokio::fs::read_to_string(path).await.map_err(|e| Error::Secret {
            provider: self.name().to_string(),
            message: format!("failed to read {path}: {e}"),
        })?;
        Ok(content.trim_end().to_string())
    }

    async fn test_connection(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn can_handle_file_scheme() {
        let p = FileSecretProvider;
        assert!(p.can_handle("file:///tmp/x"));
        assert!(!p.can_handle("vault://x"));
    }

    #[tokio::test]
    async fn resolves_and_trims_trailing_whitespace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.txt");
        std::fs::write(&path, "hunter2\n\n").unwrap();
        let p = FileSecretProvider;
        let reference = format!("file://{}", path.display());
        assert_eq!(p.resolve(&reference).await.unwrap(), "hunter2");
    }

    #[tokio::test]
    async fn missing_file_errors() {
        let p = FileSecretProvider;
        assert!(p.resolve("file:///nonexistent/path/xyz").await.is_err());
    }
}
