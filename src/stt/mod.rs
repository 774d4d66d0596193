//! Speech-to-Text Gateway
//!
//! Abstracts transcription backends behind one contract:
//! - batch: full audio in, best-effort transcript out
//! - streaming (optional capability): audio queue in, transcript events out
//!
//! The live streaming path is advisory; the end-of-session batch pass over
//! the chunk buffer is the transcript of record.

mod deepgram;
mod gateway;
mod provider;
mod whisper_api;

pub use deepgram::DeepgramProvider;
pub use gateway::SttGateway;
pub use provider::{AudioMessage, SttProvider, TranscriptEvent};
pub use whisper_api::WhisperApiProvider;
