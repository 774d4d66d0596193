pub mod buffer;
pub mod config;
pub mod directory;
pub mod error;
pub mod media;
pub mod session;
pub mod stt;
pub mod ws;

pub use buffer::{ChunkBuffer, FsChunkStore};
pub use config::Config;
pub use directory::{
    InMemoryDirectory, InMemoryResponses, Interview, InterviewDirectory, Response, ResponseStore,
    ResponseUpdate,
};
pub use error::SessionError;
pub use media::{FfmpegEncoder, FragmentEncoder, HttpObjectStorage, MergePipeline, ObjectStorage};
pub use session::{
    EventBus, FinalTranscript, ServerEvent, SessionController, SessionHandle, SessionRegistry,
    SessionState,
};
pub use stt::{
    AudioMessage, DeepgramProvider, SttGateway, SttProvider, TranscriptEvent, WhisperApiProvider,
};
pub use ws::{create_router, AppState, ClientCommand};
