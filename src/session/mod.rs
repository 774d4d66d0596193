//! Live interview session core
//!
//! This module provides the per-connection session machinery:
//! - `SessionRegistry`: process-wide table of live sessions and their tasks
//! - `SessionController`: start / ingest / end / disconnect entry points
//! - `EventBus`: per-session broadcast groups for client-bound events
//!
//! Each active session owns two background tasks (streaming transcription
//! and transcript emission); every teardown path cancels and awaits both
//! before the session counts as closed.

mod controller;
mod events;
mod registry;
mod relay;

pub use controller::{FinalTranscript, SessionController, SessionHandle};
pub use events::ServerEvent;
pub use registry::{LiveSession, SessionRegistry, SessionState};
pub use relay::EventBus;
