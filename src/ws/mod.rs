//! Client transport: websocket endpoint plus the small HTTP surface
//!
//! - GET  /ws: live interview socket (start / audio / video / end events)
//! - POST /responses/:response_id/media/merge: finalize buffered video
//! - GET  /health: health check

mod events;
mod handler;
mod routes;
mod state;

pub use events::ClientCommand;
pub use routes::create_router;
pub use state::AppState;
