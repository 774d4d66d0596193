use super::provider::SttProvider;
use crate::error::{Result, SessionError};

/// Batch-only backend for OpenAI-compatible `audio/transcriptions`
/// endpoints (Azure Whisper deployments, open-asr-server, etc.).
pub struct WhisperApiProvider {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl WhisperApiProvider {
    /// `endpoint` is the full transcription URL, e.g.
    /// `https://host/openai/deployments/whisper/audio/transcriptions?api-version=...`
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            endpoint,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl SttProvider for WhisperApiProvider {
    fn name(&self) -> &str {
        "whisper-api"
    }

    async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(SessionError::provider_transport)?;

        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(SessionError::provider_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(SessionError::provider_transport)?;

        Ok(data["text"].as_str().unwrap_or_default().to_string())
    }
}
