use super::provider::{AudioMessage, SttProvider, TranscriptEvent};
use crate::buffer::ChunkBuffer;
use crate::config::AudioConfig;
use crate::error::Result;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Front door for transcription: batch passes over the chunk buffer and
/// streaming sessions bound to a session's queues.
pub struct SttGateway {
    provider: Arc<dyn SttProvider>,
    chunks: Arc<dyn ChunkBuffer>,
    audio: AudioConfig,
    language: Option<String>,
}

impl SttGateway {
    pub fn new(
        provider: Arc<dyn SttProvider>,
        chunks: Arc<dyn ChunkBuffer>,
        audio: AudioConfig,
        language: Option<String>,
    ) -> Self {
        Self {
            provider,
            chunks,
            audio,
            language,
        }
    }

    /// Batch-transcribe everything buffered for a session.
    ///
    /// Chunks are concatenated in arrival order and wrapped into a canonical
    /// WAV before submission. Zero buffered audio yields an empty transcript
    /// without contacting the provider.
    pub async fn transcribe_session(&self, session_id: &str) -> Result<String> {
        let chunks = self.chunks.read_audio(session_id).await?;
        if chunks.is_empty() {
            info!("No buffered audio for session {}, skipping batch pass", session_id);
            return Ok(String::new());
        }

        let pcm: Vec<u8> = chunks.concat();
        let wav = wrap_pcm_wav(&pcm, self.audio.sample_rate, self.audio.channels)?;

        info!(
            "Batch transcription for session {}: {} chunks, {} bytes via {}",
            session_id,
            chunks.len(),
            pcm.len(),
            self.provider.name()
        );

        self.provider
            .transcribe(&wav, self.language.as_deref())
            .await
    }

    /// Run the provider's streaming path over a session's queues.
    ///
    /// The live stream is advisory: failures are logged and swallowed, the
    /// batch pass at session end remains the transcript of record.
    pub async fn stream_session(
        &self,
        inbound: mpsc::Receiver<AudioMessage>,
        outbound: mpsc::Sender<TranscriptEvent>,
    ) {
        if let Err(e) = self.provider.stream_transcribe(inbound, outbound).await {
            warn!(
                "Streaming transcription via {} failed: {}",
                self.provider.name(),
                e
            );
        }
    }
}

/// Wrap raw linear16 PCM into an in-memory WAV container.
///
/// Inbound chunks are already at the canonical sample rate, so this is a
/// header wrap rather than a resample. An odd trailing byte is dropped.
fn wrap_pcm_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_wrap_preserves_samples() {
        let samples: Vec<i16> = vec![0, 100, -100, i16::MAX, i16::MIN];
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let wav = wrap_pcm_wav(&pcm, 16000, 1).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);

        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn wav_wrap_drops_odd_trailing_byte() {
        let wav = wrap_pcm_wav(&[1, 0, 2], 16000, 1).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.duration(), 1);
    }
}
