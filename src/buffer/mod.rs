//! Chunk Buffer: durable store for raw audio chunks and video fragments.
//!
//! Audio chunks accumulate per session for the end-of-session batch
//! transcription pass; video fragments accumulate per response until the
//! merge pipeline drains them. Both areas are append-only and ordered by
//! arrival.

mod store;

pub use store::FsChunkStore;

use crate::error::Result;
use std::path::PathBuf;

#[async_trait::async_trait]
pub trait ChunkBuffer: Send + Sync {
    /// Append one raw audio chunk to the session's buffer.
    async fn append_audio(&self, session_id: &str, bytes: &[u8]) -> Result<()>;

    /// Read back all audio chunks for a session, in arrival order.
    /// A session that never received audio yields an empty vec.
    async fn read_audio(&self, session_id: &str) -> Result<Vec<Vec<u8>>>;

    /// Drop a session's audio buffer (registry teardown).
    async fn clear_audio(&self, session_id: &str) -> Result<()>;

    /// Write one video fragment into the per-response temporary area.
    /// Returns the fragment's location.
    async fn append_fragment(&self, response_id: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Enumerate a response's fragments in deterministic (arrival) order.
    /// Fails with `FragmentsNotFound` when the temporary area is absent.
    async fn list_fragments(&self, response_id: &str) -> Result<Vec<PathBuf>>;

    /// Delete the per-response temporary fragment area.
    async fn remove_fragments(&self, response_id: &str) -> Result<()>;
}
