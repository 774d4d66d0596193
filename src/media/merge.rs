use super::storage::ObjectStorage;
use crate::buffer::ChunkBuffer;
use crate::error::{Result, SessionError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::process::Command;
use tracing::{info, warn};

/// Concatenates an ordered list of video fragments into one output file.
#[async_trait::async_trait]
pub trait FragmentEncoder: Send + Sync {
    async fn concat(&self, fragments: &[PathBuf], output: &Path) -> Result<()>;
}

/// ffmpeg-backed encoder: re-encodes all fragments through a concat filter
/// graph into a single faststart mp4.
pub struct FfmpegEncoder;

#[async_trait::async_trait]
impl FragmentEncoder for FfmpegEncoder {
    async fn concat(&self, fragments: &[PathBuf], output: &Path) -> Result<()> {
        let mut cmd = Command::new("ffmpeg");
        for fragment in fragments {
            cmd.args(["-fflags", "+genpts", "-i"]).arg(fragment);
        }

        // [0:v][0:a][1:v][1:a]...concat=n=N:v=1:a=1[outv][outa]
        let mut filter = String::new();
        for i in 0..fragments.len() {
            filter.push_str(&format!("[{i}:v][{i}:a]"));
        }
        filter.push_str(&format!("concat=n={}:v=1:a=1[outv][outa]", fragments.len()));

        cmd.args(["-filter_complex", &filter])
            .args(["-map", "[outv]", "-map", "[outa]"])
            .args(["-c:v", "libx264", "-preset", "fast", "-crf", "23"])
            .args(["-c:a", "aac", "-b:a", "128k"])
            .args(["-movflags", "+faststart", "-y"])
            .arg(output);

        info!("Re-encoding {} fragments into {}", fragments.len(), output.display());

        let result = cmd.output().await?;
        if !result.status.success() {
            return Err(SessionError::Merge {
                detail: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }

        Ok(())
    }
}

/// Drains a response's temporary fragment area into one merged artifact.
///
/// Not idempotent against concurrent calls for the same response; the
/// end-of-interview flow is expected to call it once.
pub struct MergePipeline {
    chunks: Arc<dyn ChunkBuffer>,
    encoder: Arc<dyn FragmentEncoder>,
    video_dir: PathBuf,
    storage: Option<Arc<dyn ObjectStorage>>,
}

impl MergePipeline {
    pub fn new(
        chunks: Arc<dyn ChunkBuffer>,
        encoder: Arc<dyn FragmentEncoder>,
        video_dir: impl Into<PathBuf>,
        storage: Option<Arc<dyn ObjectStorage>>,
    ) -> Self {
        Self {
            chunks,
            encoder,
            video_dir: video_dir.into(),
            storage,
        }
    }

    /// Merge all buffered fragments for a response.
    ///
    /// Fails with `FragmentsNotFound` when the response has no fragment
    /// area (expected for sessions without recording). On success the
    /// temporary area is deleted; a cleanup failure is logged but never
    /// masks the merge. Returns the final storage key or local path.
    pub async fn merge(&self, response_id: &str) -> Result<String> {
        let fragments = self.chunks.list_fragments(response_id).await?;

        fs::create_dir_all(&self.video_dir).await?;
        let output = self.video_dir.join(format!("{response_id}.mp4"));

        self.encoder.concat(&fragments, &output).await?;

        if let Err(e) = self.chunks.remove_fragments(response_id).await {
            warn!(
                "Failed to remove fragment area for {}: {}",
                response_id, e
            );
        }

        match &self.storage {
            Some(storage) => {
                let key = format!("videos/{response_id}.mp4");
                let bytes = fs::read(&output).await?;
                storage.put(&key, bytes, "video/mp4").await?;

                if let Err(e) = fs::remove_file(&output).await {
                    warn!("Failed to remove local copy {}: {}", output.display(), e);
                }

                info!("Merged video for {} uploaded as {}", response_id, key);
                Ok(key)
            }
            None => {
                info!(
                    "Merged video for {} at {}",
                    response_id,
                    output.display()
                );
                Ok(output.display().to_string())
            }
        }
    }
}
