use super::provider::{AudioMessage, SttProvider, TranscriptEvent};
use crate::error::{Result, SessionError};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

const BATCH_URL: &str = "https://api.deepgram.com/v1/listen";
const STREAM_URL: &str = "wss://api.deepgram.com/v1/listen\
    ?model=nova-2&punctuate=true&interim_results=true&endpointing=50&smart_format=true";

/// Deepgram backend: batch over the pre-recorded endpoint, real-time over
/// the streaming websocket.
pub struct DeepgramProvider {
    api_key: String,
    client: reqwest::Client,
}

impl DeepgramProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl SttProvider for DeepgramProvider {
    fn name(&self) -> &str {
        "deepgram"
    }

    async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> Result<String> {
        let mut request = self
            .client
            .post(BATCH_URL)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec());

        if let Some(language) = language {
            request = request.query(&[("language", language)]);
        }

        let response = request
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

        let transcript = data["results"]["channels"][0]["alternatives"][0]["transcript"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(transcript)
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn stream_transcribe(
        &self,
        mut inbound: mpsc::Receiver<AudioMessage>,
        outbound: mpsc::Sender<TranscriptEvent>,
    ) -> Result<()> {
        let mut request = STREAM_URL
            .into_client_request()
            .map_err(SessionError::provider_transport)?;
        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&format!("Token {}", self.api_key))
                .map_err(SessionError::provider_transport)?,
        );

        let (ws, _) = connect_async(request)
            .await
            .map_err(SessionError::provider_transport)?;
        let (mut sink, mut stream) = ws.split();

        info!("Deepgram streaming connection established");

        // Forwards queued audio to the provider until the sentinel. A send
        // failure means the provider hung up; stop sending, the receiver
        // half will observe the close.
        let sender = async move {
            while let Some(msg) = inbound.recv().await {
                match msg {
                    AudioMessage::End => {
                        let close = Message::Text(r#"{"type":"CloseStream"}"#.to_string());
                        if let Err(e) = sink.send(close).await {
                            warn!("Failed to send CloseStream: {}", e);
                        }
                        break;
                    }
                    AudioMessage::Chunk(bytes) => {
                        if bytes.is_empty() {
                            continue;
                        }
                        if sink.send(Message::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        };

        // Reads result frames and pushes non-empty segments outbound.
        // Connection close or reset is normal stream termination.
        let receiver = async move {
            while let Some(frame) = stream.next().await {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        info!("Deepgram stream closed: {}", e);
                        break;
                    }
                };

                match frame {
                    Message::Text(text) => {
                        let Ok(data) = serde_json::from_str::<serde_json::Value>(&text) else {
                            continue;
                        };
                        if data["type"] != "Results" {
                            continue;
                        }
                        let transcript = data["channel"]["alternatives"][0]["transcript"]
                            .as_str()
                            .unwrap_or_default();
                        if transcript.is_empty() {
                            continue;
                        }
                        let event = TranscriptEvent {
                            text: transcript.to_string(),
                            is_final: data["is_final"].as_bool().unwrap_or(false),
                        };
                        if outbound.send(event).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        };

        tokio::join!(sender, receiver);

        info!("Deepgram streaming session ended");

        Ok(())
    }
}
