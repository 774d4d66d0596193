// Integration tests for the session controller
//
// A mock STT provider records what it was asked to transcribe and flags
// when its streaming task actually terminated, so teardown is verified
// through completion barriers rather than timing guesses.

use anyhow::Result;
use interview_live::config::SessionSettings;
use interview_live::{
    AudioMessage, ChunkBuffer, EventBus, FsChunkStore, InMemoryDirectory, InMemoryResponses,
    Interview, Response, ResponseStore, ServerEvent, SessionController, SessionError, SttGateway,
    SttProvider, TranscriptEvent,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;

const FINAL_TEXT: &str = "tell me about a project you are proud of";

#[derive(Default)]
struct MockProvider {
    batch_inputs: Mutex<Vec<Vec<u8>>>,
    streamed_chunks: AtomicUsize,
    stream_finished: AtomicBool,
}

#[async_trait::async_trait]
impl SttProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        _language: Option<&str>,
    ) -> Result<String, SessionError> {
        self.batch_inputs.lock().unwrap().push(audio.to_vec());
        Ok(FINAL_TEXT.to_string())
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn stream_transcribe(
        &self,
        mut inbound: mpsc::Receiver<AudioMessage>,
        outbound: mpsc::Sender<TranscriptEvent>,
    ) -> Result<(), SessionError> {
        while let Some(msg) = inbound.recv().await {
            match msg {
                AudioMessage::Chunk(_) => {
                    self.streamed_chunks.fetch_add(1, Ordering::SeqCst);
                    let _ = outbound
                        .send(TranscriptEvent {
                            text: "partial".to_string(),
                            is_final: false,
                        })
                        .await;
                }
                AudioMessage::End => break,
            }
        }
        self.stream_finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    controller: SessionController,
    bus: Arc<EventBus>,
    provider: Arc<MockProvider>,
    responses: Arc<InMemoryResponses>,
    _temp: TempDir,
}

async fn harness() -> Result<Harness> {
    let temp = TempDir::new()?;
    let chunks: Arc<dyn ChunkBuffer> = Arc::new(FsChunkStore::new(temp.path())?);

    let provider = Arc::new(MockProvider::default());
    let provider_dyn: Arc<dyn SttProvider> = Arc::clone(&provider) as Arc<dyn SttProvider>;
    let gateway = Arc::new(SttGateway::new(
        provider_dyn,
        Arc::clone(&chunks),
        interview_live::config::AudioConfig {
            sample_rate: 16000,
            channels: 1,
        },
        None,
    ));

    let interviews = InMemoryDirectory::new();
    interviews
        .insert(Interview {
            id: "I1".to_string(),
            is_active: true,
            question_mode: None,
        })
        .await;
    interviews
        .insert(Interview {
            id: "I-closed".to_string(),
            is_active: false,
            question_mode: None,
        })
        .await;

    let responses = InMemoryResponses::new();
    responses
        .insert(Response {
            id: "R1".to_string(),
            ..Default::default()
        })
        .await;

    let bus = EventBus::new();
    let interviews_dyn =
        Arc::clone(&interviews) as Arc<dyn interview_live::InterviewDirectory>;
    let responses_dyn = Arc::clone(&responses) as Arc<dyn ResponseStore>;
    let controller = SessionController::new(
        Arc::clone(&bus),
        chunks,
        gateway,
        interviews_dyn,
        responses_dyn,
        SessionSettings::default(),
    );

    Ok(Harness {
        controller,
        bus,
        provider,
        responses,
        _temp: temp,
    })
}

/// PCM chunk holding the given i16 samples.
fn pcm(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Samples the provider's batch pass was given, decoded from its WAV input.
fn batch_samples(provider: &MockProvider) -> Vec<Vec<i16>> {
    provider
        .batch_inputs
        .lock()
        .unwrap()
        .iter()
        .map(|wav| {
            hound::WavReader::new(Cursor::new(wav.clone()))
                .unwrap()
                .samples::<i16>()
                .map(|s| s.unwrap())
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn start_on_inactive_interview_creates_no_session() -> Result<()> {
    let h = harness().await?;

    let err = h
        .controller
        .start_session("c1", "I-closed", "R1")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InterviewInactive { .. }));
    assert!(h.controller.registry().is_empty().await);

    Ok(())
}

#[tokio::test]
async fn start_on_unknown_interview_is_not_found() -> Result<()> {
    let h = harness().await?;

    let err = h
        .controller
        .start_session("c1", "I-missing", "R1")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InterviewNotFound { .. }));
    assert!(h.controller.registry().is_empty().await);

    Ok(())
}

#[tokio::test]
async fn second_start_for_live_connection_is_rejected() -> Result<()> {
    let h = harness().await?;

    let handle = h.controller.start_session("c1", "I1", "R1").await?;
    assert_eq!(handle.session_id, "I1_R1");

    let err = h
        .controller
        .start_session("c1", "I1", "R1")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::SessionAlreadyActive { .. }));

    // The original session is untouched
    assert_eq!(h.controller.registry().len().await, 1);

    h.controller.on_disconnect("c1").await;

    Ok(())
}

#[tokio::test]
async fn ingest_on_unknown_connection_mutates_nothing() -> Result<()> {
    let h = harness().await?;

    let err = h
        .controller
        .ingest_audio_chunk("ghost", b"audio")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NoActiveSession { .. }));

    let err = h
        .controller
        .ingest_video_fragment("R-missing", "AAAA")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ResponseNotFound { .. }));

    assert!(h.controller.registry().is_empty().await);
    assert!(h.provider.batch_inputs.lock().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn empty_audio_chunk_is_rejected() -> Result<()> {
    let h = harness().await?;

    h.controller.start_session("c1", "I1", "R1").await?;
    let err = h.controller.ingest_audio_chunk("c1", b"").await.unwrap_err();
    assert!(matches!(err, SessionError::EmptyChunk));

    h.controller.on_disconnect("c1").await;

    Ok(())
}

#[tokio::test]
async fn end_session_batches_chunks_in_arrival_order() -> Result<()> {
    let h = harness().await?;

    let handle = h.controller.start_session("c1", "I1", "R1").await?;
    let mut events = h.bus.join(&handle.session_id).await;

    h.controller.ingest_audio_chunk("c1", &pcm(&[1])).await?;
    h.controller.ingest_audio_chunk("c1", &pcm(&[2])).await?;
    h.controller.ingest_audio_chunk("c1", &pcm(&[3])).await?;

    let result = h.controller.end_session("c1").await?;
    assert_eq!(result.transcript, FINAL_TEXT);

    // Batch input is b1+b2+b3, in that order, exactly once
    assert_eq!(batch_samples(&h.provider), vec![vec![1i16, 2, 3]]);

    // Both background tasks were awaited to completion
    assert!(h.provider.stream_finished.load(Ordering::SeqCst));
    assert_eq!(h.provider.streamed_chunks.load(Ordering::SeqCst), 3);

    // Registry entry is gone; further events see no session
    assert!(h.controller.registry().is_empty().await);
    let err = h
        .controller
        .ingest_audio_chunk("c1", &pcm(&[4]))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NoActiveSession { .. }));

    // Exactly one final transcript_result was observed by the client
    let mut finals = 0;
    while let Ok(event) = events.recv().await {
        if let ServerEvent::TranscriptResult { text } = event {
            assert_eq!(text, FINAL_TEXT);
            finals += 1;
        }
    }
    assert_eq!(finals, 1);

    // Final transcript persisted to the response record
    let response = h.responses.get_response("R1").await?;
    assert_eq!(response.transcripts, vec![FINAL_TEXT.to_string()]);
    assert!(response.is_ended);

    Ok(())
}

#[tokio::test]
async fn end_session_without_audio_skips_the_provider() -> Result<()> {
    let h = harness().await?;

    h.controller.start_session("c1", "I1", "R1").await?;
    let result = h.controller.end_session("c1").await?;

    assert_eq!(result.transcript, "");
    assert!(h.provider.batch_inputs.lock().unwrap().is_empty());
    assert!(h.controller.registry().is_empty().await);

    Ok(())
}

#[tokio::test]
async fn end_on_unknown_connection_is_no_active_session() -> Result<()> {
    let h = harness().await?;

    let err = h.controller.end_session("ghost").await.unwrap_err();
    assert!(matches!(err, SessionError::NoActiveSession { .. }));

    Ok(())
}

#[tokio::test]
async fn disconnect_tears_down_without_batch_or_persist() -> Result<()> {
    let h = harness().await?;

    h.controller.start_session("c1", "I1", "R1").await?;
    h.controller.ingest_audio_chunk("c1", &pcm(&[7])).await?;

    h.controller.on_disconnect("c1").await;

    // Tasks terminated, no entry left, no batch pass, no persistence
    assert!(h.provider.stream_finished.load(Ordering::SeqCst));
    assert!(h.controller.registry().is_empty().await);
    assert!(h.provider.batch_inputs.lock().unwrap().is_empty());

    let response = h.responses.get_response("R1").await?;
    assert!(response.transcripts.is_empty());
    assert!(!response.is_ended);

    // A second disconnect is a no-op
    h.controller.on_disconnect("c1").await;

    Ok(())
}

#[tokio::test]
async fn data_uri_and_raw_base64_decode_identically() -> Result<()> {
    let h = harness().await?;

    let from_data_uri = h
        .controller
        .ingest_video_fragment("R1", "data:video/mp4;base64,AAAA")
        .await?;
    let from_raw = h.controller.ingest_video_fragment("R1", "AAAA").await?;

    let a = tokio::fs::read(&from_data_uri).await?;
    let b = tokio::fs::read(&from_raw).await?;
    assert_eq!(a, b);
    assert_eq!(a, vec![0u8; 3]);

    Ok(())
}

#[tokio::test]
async fn malformed_video_payload_is_a_decode_error() -> Result<()> {
    let h = harness().await?;

    let err = h
        .controller
        .ingest_video_fragment("R1", "not base64!!!")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Decode(_)));

    Ok(())
}

#[tokio::test]
async fn partial_transcripts_reach_group_members_in_order() -> Result<()> {
    let h = harness().await?;

    let handle = h.controller.start_session("c1", "I1", "R1").await?;
    let mut events = h.bus.join(&handle.session_id).await;

    for i in 0..3i16 {
        h.controller.ingest_audio_chunk("c1", &pcm(&[i])).await?;
    }
    h.controller.end_session("c1").await?;

    let mut received = Vec::new();
    while let Ok(event) = events.recv().await {
        received.push(event);
    }

    // Three partials in emission order, then the final result
    assert_eq!(received.len(), 4);
    for event in &received[..3] {
        assert!(matches!(event, ServerEvent::PartialTranscript { is_final: false, .. }));
    }
    assert!(matches!(received[3], ServerEvent::TranscriptResult { .. }));

    Ok(())
}
