//! Error taxonomy for the live interview core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    // Lookup failures, surfaced synchronously to the caller
    #[error("Interview {id} not found")]
    InterviewNotFound { id: String },

    #[error("Interview {id} is not active")]
    InterviewInactive { id: String },

    #[error("Response {id} not found")]
    ResponseNotFound { id: String },

    #[error("No active session for connection {connection_id}")]
    NoActiveSession { connection_id: String },

    #[error("Connection {connection_id} already has an active session")]
    SessionAlreadyActive { connection_id: String },

    // Inbound payload errors
    #[error("Empty audio chunk")]
    EmptyChunk,

    #[error("Base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    // Transcription backend errors
    #[error("Transcription provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Transcription provider transport error: {message}")]
    ProviderTransport { message: String },

    // Media merge errors
    #[error("No video fragments found for response {response_id}")]
    FragmentsNotFound { response_id: String },

    #[error("Fragment merge failed: {detail}")]
    Merge { detail: String },

    #[error("Storage upload failed: {message}")]
    Storage { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Audio encoding failed: {0}")]
    Wav(#[from] hound::Error),
}

impl SessionError {
    pub fn provider_transport(err: impl std::fmt::Display) -> Self {
        Self::ProviderTransport {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
