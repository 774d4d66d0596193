use crate::media::MergePipeline;
use crate::session::{EventBus, SessionController};
use std::sync::Arc;

/// Shared application state for the transport layer.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub bus: Arc<EventBus>,
    pub merge: Arc<MergePipeline>,
}
