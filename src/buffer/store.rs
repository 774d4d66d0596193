use super::ChunkBuffer;
use crate::error::{Result, SessionError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

/// Filesystem-backed chunk store.
///
/// Layout under the base directory:
/// - `audio/<session_id>/NNNNNN.pcm`: raw audio chunks
/// - `temp/<response_id>/NNNNNN.mp4`: video fragments awaiting merge
///
/// Filenames are zero-padded monotonic sequence numbers, so lexicographic
/// order equals arrival order and read-back is deterministic.
pub struct FsChunkStore {
    audio_dir: PathBuf,
    temp_dir: PathBuf,

    /// Per-key next sequence number, guarded because appends for the same
    /// response can arrive from concurrent handler flows
    counters: Mutex<HashMap<String, u64>>,
}

impl FsChunkStore {
    pub fn new(base_path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_path = base_path.into();
        let audio_dir = base_path.join("audio");
        let temp_dir = base_path.join("temp");

        std::fs::create_dir_all(&audio_dir)?;
        std::fs::create_dir_all(&temp_dir)?;

        info!("Chunk store initialized at {}", base_path.display());

        Ok(Self {
            audio_dir,
            temp_dir,
            counters: Mutex::new(HashMap::new()),
        })
    }

    /// Temporary fragment area for a response, if it exists.
    pub fn fragment_area(&self, response_id: &str) -> PathBuf {
        self.temp_dir.join(response_id)
    }

    /// Next sequence number for a key. A fresh counter is seeded past any
    /// files already in the directory, so appends after a process restart
    /// continue the numbering instead of overwriting surviving files.
    async fn next_seq(&self, key: &str, dir: &Path) -> Result<u64> {
        let mut counters = self.counters.lock().await;
        if let Some(counter) = counters.get_mut(key) {
            let seq = *counter;
            *counter += 1;
            return Ok(seq);
        }

        let mut seq = 0;
        let mut read_dir = fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if let Ok(existing) = stem.parse::<u64>() {
                    seq = seq.max(existing + 1);
                }
            }
        }
        counters.insert(key.to_string(), seq + 1);
        Ok(seq)
    }

    async fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if entry.file_type().await?.is_file() {
                entries.push(entry.path());
            }
        }
        entries.sort();
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl ChunkBuffer for FsChunkStore {
    async fn append_audio(&self, session_id: &str, bytes: &[u8]) -> Result<()> {
        let session_dir = self.audio_dir.join(session_id);
        fs::create_dir_all(&session_dir).await?;

        let seq = self.next_seq(&format!("audio/{session_id}"), &session_dir).await?;
        let path = session_dir.join(format!("{seq:06}.pcm"));
        fs::write(&path, bytes).await?;

        Ok(())
    }

    async fn read_audio(&self, session_id: &str) -> Result<Vec<Vec<u8>>> {
        let session_dir = self.audio_dir.join(session_id);
        if !session_dir.exists() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        for path in Self::sorted_entries(&session_dir).await? {
            chunks.push(fs::read(&path).await?);
        }

        Ok(chunks)
    }

    async fn clear_audio(&self, session_id: &str) -> Result<()> {
        let session_dir = self.audio_dir.join(session_id);
        if session_dir.exists() {
            fs::remove_dir_all(&session_dir).await?;
        }

        let mut counters = self.counters.lock().await;
        counters.remove(&format!("audio/{session_id}"));

        Ok(())
    }

    async fn append_fragment(&self, response_id: &str, bytes: &[u8]) -> Result<PathBuf> {
        let fragment_dir = self.temp_dir.join(response_id);
        fs::create_dir_all(&fragment_dir).await?;

        // Extension pinned to mp4 regardless of the client-reported container
        let seq = self.next_seq(&format!("temp/{response_id}"), &fragment_dir).await?;
        let path = fragment_dir.join(format!("{seq:06}.mp4"));
        fs::write(&path, bytes).await?;

        Ok(path)
    }

    async fn list_fragments(&self, response_id: &str) -> Result<Vec<PathBuf>> {
        let fragment_dir = self.temp_dir.join(response_id);
        if !fragment_dir.exists() {
            return Err(SessionError::FragmentsNotFound {
                response_id: response_id.to_string(),
            });
        }

        let fragments = Self::sorted_entries(&fragment_dir).await?;
        if fragments.is_empty() {
            return Err(SessionError::FragmentsNotFound {
                response_id: response_id.to_string(),
            });
        }

        Ok(fragments)
    }

    async fn remove_fragments(&self, response_id: &str) -> Result<()> {
        let fragment_dir = self.temp_dir.join(response_id);
        if fragment_dir.exists() {
            fs::remove_dir_all(&fragment_dir).await?;
        }

        let mut counters = self.counters.lock().await;
        counters.remove(&format!("temp/{response_id}"));

        Ok(())
    }
}
