use super::events::ServerEvent;
use crate::stt::TranscriptEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

const GROUP_CAPACITY: usize = 64;

/// Named broadcast groups for client-bound events.
///
/// A group is named by `session_id`; in the common case it has one member
/// (the candidate's connection), but additional listeners can join.
#[derive(Default)]
pub struct EventBus {
    groups: RwLock<HashMap<String, broadcast::Sender<ServerEvent>>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join a group, creating it if needed.
    pub async fn join(&self, group: &str) -> broadcast::Receiver<ServerEvent> {
        let mut groups = self.groups.write().await;
        groups
            .entry(group.to_string())
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to every member of a group. A group with no members
    /// drops the event.
    pub async fn publish(&self, group: &str, event: ServerEvent) {
        let groups = self.groups.read().await;
        if let Some(sender) = groups.get(group) {
            // send only errors when there are no receivers
            let _ = sender.send(event);
        }
    }

    /// Tear a group down. Live receivers observe a closed channel.
    pub async fn leave(&self, group: &str) {
        let mut groups = self.groups.write().await;
        if groups.remove(group).is_some() {
            info!("Broadcast group {} closed", group);
        }
    }
}

/// Spawn the transcript-emission task for a session: drains the transcript
/// queue in provider order and fans each segment out to the session group.
/// Exits when the queue closes (streaming task done) or on cancellation.
pub fn spawn_emitter(
    bus: Arc<EventBus>,
    session_id: String,
    mut transcripts: mpsc::Receiver<TranscriptEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = transcripts.recv().await {
            bus.publish(
                &session_id,
                ServerEvent::PartialTranscript {
                    text: update.text,
                    is_final: update.is_final,
                },
            )
            .await;
        }

        info!("Transcript emitter for {} stopped", session_id);
    })
}
