//! Collaborator interfaces for interview and response records.
//!
//! The CRUD backend that owns these entities lives outside this crate; the
//! session core only needs a lookup and a narrow update surface. In-memory
//! implementations back the standalone binary and the test suite.

use crate::error::{Result, SessionError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Interview record, as seen by the session core.
#[derive(Debug, Clone)]
pub struct Interview {
    pub id: String,
    pub is_active: bool,
    pub question_mode: Option<String>,
}

/// Response record, as seen by the session core.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub id: String,
    pub transcripts: Vec<String>,
    pub is_ended: bool,
}

/// Fields the session core is allowed to update on a response.
#[derive(Debug, Clone, Default)]
pub struct ResponseUpdate {
    /// Appended to the response's transcript list
    pub transcript: Option<String>,
    pub is_ended: Option<bool>,
}

#[async_trait::async_trait]
pub trait InterviewDirectory: Send + Sync {
    async fn get_interview(&self, id: &str) -> Result<Interview>;
}

#[async_trait::async_trait]
pub trait ResponseStore: Send + Sync {
    async fn get_response(&self, id: &str) -> Result<Response>;

    async fn update_response(&self, id: &str, update: ResponseUpdate) -> Result<()>;
}

/// In-memory interview directory.
#[derive(Default)]
pub struct InMemoryDirectory {
    interviews: RwLock<HashMap<String, Interview>>,
}

impl InMemoryDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert(&self, interview: Interview) {
        let mut interviews = self.interviews.write().await;
        interviews.insert(interview.id.clone(), interview);
    }
}

#[async_trait::async_trait]
impl InterviewDirectory for InMemoryDirectory {
    async fn get_interview(&self, id: &str) -> Result<Interview> {
        let interviews = self.interviews.read().await;
        interviews
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::InterviewNotFound { id: id.to_string() })
    }
}

/// In-memory response store.
#[derive(Default)]
pub struct InMemoryResponses {
    responses: RwLock<HashMap<String, Response>>,
}

impl InMemoryResponses {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert(&self, response: Response) {
        let mut responses = self.responses.write().await;
        responses.insert(response.id.clone(), response);
    }
}

#[async_trait::async_trait]
impl ResponseStore for InMemoryResponses {
    async fn get_response(&self, id: &str) -> Result<Response> {
        let responses = self.responses.read().await;
        responses
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::ResponseNotFound { id: id.to_string() })
    }

    async fn update_response(&self, id: &str, update: ResponseUpdate) -> Result<()> {
        let mut responses = self.responses.write().await;
        let response = responses
            .get_mut(id)
            .ok_or_else(|| SessionError::ResponseNotFound { id: id.to_string() })?;

        if let Some(text) = update.transcript {
            response.transcripts.push(text);
        }
        if let Some(ended) = update.is_ended {
            response.is_ended = ended;
        }

        Ok(())
    }
}
