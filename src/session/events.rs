use serde::{Deserialize, Serialize};

/// Event delivered to connected clients over a session's broadcast group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected { sid: String },

    /// Incremental transcript from the live streaming path
    PartialTranscript { text: String, is_final: bool },

    VideoChunkSaved { ok: bool },

    /// Final transcript from the end-of-session batch pass
    TranscriptResult { text: String },

    Error { error: String },
}
