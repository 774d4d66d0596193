use super::events::ServerEvent;
use super::registry::{LiveSession, SessionRegistry, SessionState};
use super::relay::{self, EventBus};
use crate::buffer::ChunkBuffer;
use crate::config::SessionSettings;
use crate::directory::{InterviewDirectory, ResponseStore, ResponseUpdate};
use crate::error::{Result, SessionError};
use crate::stt::{AudioMessage, SttGateway};
use base64::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Grace period for handing the end-of-stream sentinel to a stalled queue
/// before falling back to forceful cancellation.
const SENTINEL_TIMEOUT: Duration = Duration::from_millis(500);

/// How long a task gets to exit on its own after the sentinel before it is
/// forcefully cancelled.
const TASK_GRACE: Duration = Duration::from_secs(5);

/// Returned by `start_session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: String,
    pub response_id: String,
}

/// Returned by `end_session`: the transcript of record from the batch pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalTranscript {
    pub transcript: String,
}

/// Per-connection session state machine: starts sessions, pipes audio in,
/// pipes transcripts out, finalizes, tears down.
pub struct SessionController {
    registry: SessionRegistry,
    bus: Arc<EventBus>,
    chunks: Arc<dyn ChunkBuffer>,
    stt: Arc<SttGateway>,
    interviews: Arc<dyn InterviewDirectory>,
    responses: Arc<dyn ResponseStore>,
    settings: SessionSettings,
}

impl SessionController {
    pub fn new(
        bus: Arc<EventBus>,
        chunks: Arc<dyn ChunkBuffer>,
        stt: Arc<SttGateway>,
        interviews: Arc<dyn InterviewDirectory>,
        responses: Arc<dyn ResponseStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(),
            bus,
            chunks,
            stt,
            interviews,
            responses,
            settings,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Start a live session for a connection.
    ///
    /// Verifies the interview exists and is active, reserves the connection's
    /// registry slot, then spawns the streaming-transcription task and the
    /// transcript-emission task bound to the session's queues.
    pub async fn start_session(
        &self,
        connection_id: &str,
        interview_id: &str,
        response_id: &str,
    ) -> Result<SessionHandle> {
        let interview = self.interviews.get_interview(interview_id).await?;
        if !interview.is_active {
            return Err(SessionError::InterviewInactive {
                id: interview_id.to_string(),
            });
        }

        let session_id = format!("{interview_id}_{response_id}");

        let (audio_tx, audio_rx) = mpsc::channel(self.settings.audio_queue_capacity);
        let (transcript_tx, transcript_rx) =
            mpsc::channel(self.settings.transcript_queue_capacity);

        // Reserve before spawning so a racing start for the same connection
        // is rejected without leaving orphan tasks behind
        self.registry
            .reserve(
                connection_id,
                session_id.clone(),
                response_id.to_string(),
                audio_tx,
            )
            .await?;

        let stt = Arc::clone(&self.stt);
        let stt_task = tokio::spawn(async move {
            stt.stream_session(audio_rx, transcript_tx).await;
        });

        let emit_task = relay::spawn_emitter(Arc::clone(&self.bus), session_id.clone(), transcript_rx);

        self.registry
            .activate(connection_id, stt_task, emit_task)
            .await;

        info!(
            "Session {} started for connection {} (response {})",
            session_id, connection_id, response_id
        );

        Ok(SessionHandle {
            session_id,
            response_id: response_id.to_string(),
        })
    }

    /// Ingest one raw audio chunk for a connection's session.
    ///
    /// The chunk is handed to the live streaming queue without blocking and
    /// durably appended to the chunk buffer. When the streaming queue is
    /// full (stalled provider) the live frame is dropped; the durable append
    /// still runs, so the batch pass sees every chunk in arrival order.
    pub async fn ingest_audio_chunk(&self, connection_id: &str, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(SessionError::EmptyChunk);
        }

        let (session_id, audio_tx) = self.registry.audio_sender(connection_id).await?;

        match audio_tx.try_send(AudioMessage::Chunk(bytes.to_vec())) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Audio queue full for session {}; dropping live frame",
                    session_id
                );
            }
            // Streaming task already gone; the durable path still records
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }

        self.chunks.append_audio(&session_id, bytes).await?;

        Ok(())
    }

    /// Decode and buffer one video fragment for a response.
    ///
    /// Accepts raw base64 or a data-URI-prefixed payload; the stored
    /// container format is pinned to mp4 regardless of what the client
    /// reports. Returns the fragment's location.
    pub async fn ingest_video_fragment(
        &self,
        response_id: &str,
        payload: &str,
    ) -> Result<PathBuf> {
        // Fragments are keyed by response id; reject unknown responses
        // before touching the buffer
        self.responses.get_response(response_id).await?;

        let encoded = match payload.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => payload,
        };

        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        self.chunks.append_fragment(response_id, &bytes).await
    }

    /// End a connection's session and produce the transcript of record.
    ///
    /// Teardown order: sentinel onto the audio queue, cancel and await both
    /// tasks, batch transcription over the buffered chunks, persist to the
    /// response record. Cleanup (registry removal, group teardown, buffer
    /// release) runs on every exit path; a persistence failure is logged and
    /// never blocks it.
    pub async fn end_session(&self, connection_id: &str) -> Result<FinalTranscript> {
        let mut session = self.registry.begin_teardown(connection_id).await?;
        let session_id = session.session_id.clone();
        let response_id = session.response_id.clone();

        info!(
            "Ending session {} (connection {})",
            session_id, connection_id
        );

        shutdown_tasks(&mut session).await;

        let result = self.finalize(&session_id, &response_id).await;

        self.cleanup(&session_id).await;
        session.state = SessionState::Closed;

        let duration = chrono::Utc::now().signed_duration_since(session.started_at);
        info!(
            "Session {} closed after {:.1}s",
            session_id,
            duration.num_milliseconds() as f64 / 1000.0
        );

        result
    }

    /// Abrupt teardown on transport disconnect: no batch pass, no
    /// persistence, and nothing propagates past this boundary.
    pub async fn on_disconnect(&self, connection_id: &str) {
        let Ok(mut session) = self.registry.begin_teardown(connection_id).await else {
            return;
        };

        info!(
            "Connection {} disconnected; tearing down session {}",
            connection_id, session.session_id
        );

        shutdown_tasks(&mut session).await;

        self.cleanup(&session.session_id).await;
        session.state = SessionState::Closed;
    }

    async fn finalize(&self, session_id: &str, response_id: &str) -> Result<FinalTranscript> {
        let transcript = self.stt.transcribe_session(session_id).await?;

        self.bus
            .publish(
                session_id,
                ServerEvent::TranscriptResult {
                    text: transcript.clone(),
                },
            )
            .await;

        let update = ResponseUpdate {
            transcript: Some(transcript.clone()),
            is_ended: Some(true),
        };
        if let Err(e) = self.responses.update_response(response_id, update).await {
            warn!(
                "Failed to persist final transcript for response {}: {}",
                response_id, e
            );
        }

        Ok(FinalTranscript { transcript })
    }

    async fn cleanup(&self, session_id: &str) {
        self.bus.leave(session_id).await;

        if let Err(e) = self.chunks.clear_audio(session_id).await {
            warn!("Failed to clear audio buffer for {}: {}", session_id, e);
        }
    }
}

/// Stop a session's background tasks: sentinel first so the streaming task
/// can flush, then cancellation, then await actual termination. Cancellation
/// is an expected exit, never an error.
async fn shutdown_tasks(session: &mut LiveSession) {
    let sentinel = session.audio_tx.send(AudioMessage::End);
    if tokio::time::timeout(SENTINEL_TIMEOUT, sentinel).await.is_err() {
        warn!(
            "Audio queue for {} stalled; relying on cancellation",
            session.session_id
        );
    }

    for (name, task) in [
        ("streaming-transcribe", session.stt_task.take()),
        ("transcript-emit", session.emit_task.take()),
    ] {
        let Some(mut task) = task else { continue };

        let outcome = match tokio::time::timeout(TASK_GRACE, &mut task).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "{} task for {} did not respond to the sentinel; cancelling",
                    name, session.session_id
                );
                task.abort();
                task.await
            }
        };

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!("{} task panicked: {}", name, e),
        }
    }
}
