use crate::error::Result;
use tokio::sync::mpsc;

/// One incremental transcript segment from a provider.
///
/// Ordering within a session matches provider emission order; the provider
/// decides whether a final segment supersedes earlier partials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

/// Item on a session's audio ingestion queue.
#[derive(Debug, Clone)]
pub enum AudioMessage {
    Chunk(Vec<u8>),
    /// Sentinel: no more audio, flush and terminate
    End,
}

/// Transcription backend.
///
/// Every provider supports batch transcription; real-time providers
/// additionally implement the streaming contract.
#[async_trait::async_trait]
pub trait SttProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Transcribe a complete audio sample (canonical WAV) in one request.
    async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> Result<String>;

    fn supports_streaming(&self) -> bool {
        false
    }

    /// Consume `inbound` until the sentinel, pushing non-empty transcript
    /// segments onto `outbound` as the provider reports them.
    ///
    /// The default drains the queue without transcribing, so sessions backed
    /// by a batch-only provider never stall their audio producers.
    async fn stream_transcribe(
        &self,
        mut inbound: mpsc::Receiver<AudioMessage>,
        _outbound: mpsc::Sender<TranscriptEvent>,
    ) -> Result<()> {
        while let Some(msg) = inbound.recv().await {
            if matches!(msg, AudioMessage::End) {
                break;
            }
        }
        Ok(())
    }
}
