use crate::error::{Result, SessionError};
use crate::stt::AudioMessage;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;

/// Per-session lifecycle state.
///
/// `StartSession` drives `Initializing -> Active`; teardown always passes
/// through `Ending` (explicit task cancellation) before `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Active,
    Ending,
    Closed,
}

/// Live state for one candidate connection. Owns the audio ingestion queue
/// sender and both background task handles; the tasks must never outlive
/// this value.
pub struct LiveSession {
    pub session_id: String,
    pub response_id: String,
    pub state: SessionState,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub audio_tx: mpsc::Sender<AudioMessage>,
    pub stt_task: Option<JoinHandle<()>>,
    pub emit_task: Option<JoinHandle<()>>,
}

/// Process-wide table of live sessions keyed by connection id.
///
/// Mutated only through the controller's entry points. One connection maps
/// to at most one non-closed session; a second `start` for a live connection
/// is rejected rather than silently replacing the first.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, LiveSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot for a connection before any tasks are spawned.
    pub async fn reserve(
        &self,
        connection_id: &str,
        session_id: String,
        response_id: String,
        audio_tx: mpsc::Sender<AudioMessage>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(connection_id) {
            return Err(SessionError::SessionAlreadyActive {
                connection_id: connection_id.to_string(),
            });
        }

        sessions.insert(
            connection_id.to_string(),
            LiveSession {
                session_id,
                response_id,
                state: SessionState::Initializing,
                started_at: chrono::Utc::now(),
                audio_tx,
                stt_task: None,
                emit_task: None,
            },
        );

        Ok(())
    }

    /// Attach the spawned task handles and mark the session active.
    ///
    /// If the connection vanished between reserve and activate the handed-in
    /// tasks are shut down here so nothing leaks.
    pub async fn activate(
        &self,
        connection_id: &str,
        stt_task: JoinHandle<()>,
        emit_task: JoinHandle<()>,
    ) {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(connection_id) {
            Some(session) => {
                session.stt_task = Some(stt_task);
                session.emit_task = Some(emit_task);
                session.state = SessionState::Active;
            }
            None => {
                warn!(
                    "Connection {} disappeared during session start; aborting its tasks",
                    connection_id
                );
                stt_task.abort();
                emit_task.abort();
            }
        }
    }

    /// Session id and audio queue sender for the hot ingestion path.
    pub async fn audio_sender(
        &self,
        connection_id: &str,
    ) -> Result<(String, mpsc::Sender<AudioMessage>)> {
        let sessions = self.sessions.read().await;
        sessions
            .get(connection_id)
            .map(|s| (s.session_id.clone(), s.audio_tx.clone()))
            .ok_or_else(|| SessionError::NoActiveSession {
                connection_id: connection_id.to_string(),
            })
    }

    /// Take the session out of the table for teardown, marking it `Ending`.
    /// From this point new events for the connection see `NoActiveSession`.
    pub async fn begin_teardown(&self, connection_id: &str) -> Result<LiveSession> {
        let mut sessions = self.sessions.write().await;
        let mut session =
            sessions
                .remove(connection_id)
                .ok_or_else(|| SessionError::NoActiveSession {
                    connection_id: connection_id.to_string(),
                })?;
        session.state = SessionState::Ending;
        Ok(session)
    }

    pub async fn contains(&self, connection_id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains_key(connection_id)
    }

    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
