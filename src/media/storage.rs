use crate::error::{Result, SessionError};
use tracing::info;

/// Remote object storage for finalized artifacts.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
}

/// HTTP object store: `PUT {base_url}/{key}` with optional bearer auth.
/// Covers S3-compatible gateways and plain blob endpoints.
pub struct HttpObjectStorage {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpObjectStorage {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = format!("{}/{}", self.base_url, key);
        let size = bytes.len();

        let mut request = self
            .client
            .put(&url)
            .header("Content-Type", content_type)
            .body(bytes);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| SessionError::Storage {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Storage {
                message: format!("{status}: {body}"),
            });
        }

        info!("Uploaded {} ({} bytes)", key, size);

        Ok(())
    }
}
