use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Sample rate of inbound linear16 PCM; the batch WAV is pinned to this
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

#[derive(Debug, Deserialize)]
pub struct SttConfig {
    /// "deepgram" or "whisper-api"
    pub provider: String,

    pub api_key: String,

    /// Full endpoint for OpenAI-compatible providers; ignored by deepgram
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// "local" or "remote"
    pub storage_type: String,

    /// Base directory for the chunk store and merged videos
    pub storage_path: String,

    /// Remote object store base URL (remote mode only)
    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default)]
    pub remote_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Bounded audio queue depth. A full queue drops frames from the
    /// advisory live stream only; durable appends are unaffected.
    pub audio_queue_capacity: usize,

    pub transcript_queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            audio_queue_capacity: 256,
            transcript_queue_capacity: 64,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
