use super::events::ClientCommand;
use super::state::AppState;
use crate::error::SessionError;
use crate::session::ServerEvent;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use base64::Engine;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GET /ws: upgrade to the live interview socket
pub async fn interview_socket(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // Transport-level connection identity, ephemeral
    let connection_id = uuid::Uuid::new_v4().to_string();

    info!("Connection {} established", connection_id);

    let connected = ServerEvent::Connected {
        sid: connection_id.clone(),
    };
    if send_event(&mut socket, &connected).await.is_err() {
        return;
    }

    // Session events arrive via the broadcast group once the session starts;
    // a forwarder task pipes them into this connection's outbound queue.
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(64);
    let mut forwarder: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                let Some(Ok(msg)) = inbound else { break };
                match msg {
                    Message::Binary(bytes) => {
                        if let Err(e) = state
                            .controller
                            .ingest_audio_chunk(&connection_id, &bytes)
                            .await
                        {
                            let _ = send_error(&mut socket, &e).await;
                        }
                    }
                    Message::Text(text) => {
                        let command = match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(command) => command,
                            Err(e) => {
                                warn!("Connection {}: bad command: {}", connection_id, e);
                                let event = ServerEvent::Error {
                                    error: format!("Invalid command: {e}"),
                                };
                                let _ = send_event(&mut socket, &event).await;
                                continue;
                            }
                        };
                        if dispatch(
                            &state,
                            &connection_id,
                            command,
                            &mut socket,
                            &out_tx,
                            &mut forwarder,
                        )
                        .await
                        .is_err()
                        {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = out_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(task) = forwarder.take() {
        task.abort();
    }

    // Infallible from the transport's perspective
    state.controller.on_disconnect(&connection_id).await;

    info!("Connection {} closed", connection_id);
}

/// Dispatch one inbound command. Err means the socket is gone.
async fn dispatch(
    state: &AppState,
    connection_id: &str,
    command: ClientCommand,
    socket: &mut WebSocket,
    out_tx: &mpsc::Sender<ServerEvent>,
    forwarder: &mut Option<JoinHandle<()>>,
) -> Result<(), axum::Error> {
    match command {
        ClientCommand::StartInterview {
            interview_id,
            response_id,
        } => {
            match state
                .controller
                .start_session(connection_id, &interview_id, &response_id)
                .await
            {
                Ok(handle) => {
                    // Join the session's broadcast group and forward its
                    // events to this connection
                    let group_rx = state.bus.join(&handle.session_id).await;
                    *forwarder = Some(spawn_forwarder(group_rx, out_tx.clone()));

                    send_json(
                        socket,
                        &json!({
                            "ok": true,
                            "session_id": handle.session_id,
                            "response_id": handle.response_id,
                        }),
                    )
                    .await?;
                }
                Err(e) => send_error(socket, &e).await?,
            }
        }
        ClientCommand::SendAudioChunk { chunk_data } => {
            let result = match base64::engine::general_purpose::STANDARD.decode(&chunk_data) {
                Ok(bytes) => {
                    state
                        .controller
                        .ingest_audio_chunk(connection_id, &bytes)
                        .await
                }
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(()) => send_json(socket, &json!({ "ok": true })).await?,
                Err(e) => send_error(socket, &e).await?,
            }
        }
        ClientCommand::SaveVideoChunk { response_id, chunk } => {
            match state
                .controller
                .ingest_video_fragment(&response_id, &chunk)
                .await
            {
                Ok(_) => {
                    send_event(socket, &ServerEvent::VideoChunkSaved { ok: true }).await?;
                }
                Err(e) => send_error(socket, &e).await?,
            }
        }
        ClientCommand::EndInterview => {
            match state.controller.end_session(connection_id).await {
                Ok(result) => {
                    send_json(
                        socket,
                        &json!({
                            "ok": true,
                            "final": true,
                            "transcript": result.transcript,
                        }),
                    )
                    .await?;
                }
                Err(e) => send_error(socket, &e).await?,
            }
        }
    }

    Ok(())
}

/// Pipe a session group's events into one connection's outbound queue.
/// A stalled socket can lag behind the group buffer; the dropped backlog
/// is skipped and receiving continues, so later events (the final
/// transcript in particular) still reach the client.
fn spawn_forwarder(
    mut group_rx: broadcast::Receiver<ServerEvent>,
    events: mpsc::Sender<ServerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match group_rx.recv().await {
                Ok(event) => {
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event forwarder lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    send_json(socket, event).await
}

async fn send_error(socket: &mut WebSocket, err: &SessionError) -> Result<(), axum::Error> {
    let event = ServerEvent::Error {
        error: err.to_string(),
    };
    send_json(socket, &event).await
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), axum::Error> {
    match serde_json::to_string(value) {
        Ok(text) => socket.send(Message::Text(text)).await,
        Err(e) => {
            error!("Failed to serialize outbound event: {}", e);
            Ok(())
        }
    }
}

/// POST /responses/:response_id/media/merge
/// Finalize a response's buffered video fragments into one artifact
pub async fn merge_video(
    State(state): State<AppState>,
    Path(response_id): Path<String>,
) -> impl IntoResponse {
    match state.merge.merge(&response_id).await {
        Ok(location) => (
            StatusCode::OK,
            Json(json!({ "video_merged": true, "location": location })),
        )
            .into_response(),
        // Expected for sessions that never recorded video
        Err(SessionError::FragmentsNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "video_merged": false })),
        )
            .into_response(),
        Err(e) => {
            error!("Video merge failed for {}: {}", response_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Video merge failed: {e}"),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::EventBus;

    #[tokio::test]
    async fn forwarder_survives_group_lag_and_delivers_the_final_event() {
        let bus = EventBus::new();
        let group_rx = bus.join("i1_r1").await;

        // Overrun the group buffer before the forwarder gets to run, then
        // publish the event that must still be delivered
        for i in 0..200 {
            bus.publish(
                "i1_r1",
                ServerEvent::PartialTranscript {
                    text: i.to_string(),
                    is_final: false,
                },
            )
            .await;
        }
        bus.publish(
            "i1_r1",
            ServerEvent::TranscriptResult {
                text: "done".to_string(),
            },
        )
        .await;

        let (out_tx, mut out_rx) = mpsc::channel(256);
        let task = spawn_forwarder(group_rx, out_tx);
        bus.leave("i1_r1").await;

        let mut last = None;
        while let Some(event) = out_rx.recv().await {
            last = Some(event);
        }
        task.await.unwrap();

        assert!(matches!(last, Some(ServerEvent::TranscriptResult { text }) if text == "done"));
    }
}
