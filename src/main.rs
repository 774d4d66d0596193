use anyhow::{Context, Result};
use clap::Parser;
use interview_live::{
    AppState, ChunkBuffer, Config, DeepgramProvider, EventBus, FfmpegEncoder, FsChunkStore,
    HttpObjectStorage, InMemoryDirectory, InMemoryResponses, MergePipeline, ObjectStorage,
    SessionController, SttGateway, SttProvider, WhisperApiProvider,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "interview-live", about = "Live interview session service")]
struct Args {
    /// Config file (without extension), loaded via the config crate
    #[arg(long, default_value = "config/interview-live")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);

    let chunks: Arc<dyn ChunkBuffer> = Arc::new(
        FsChunkStore::new(&cfg.storage.storage_path).context("Failed to open chunk store")?,
    );

    let provider: Arc<dyn SttProvider> = match cfg.stt.provider.as_str() {
        "deepgram" => Arc::new(DeepgramProvider::new(cfg.stt.api_key.clone())),
        "whisper-api" => {
            let endpoint = cfg
                .stt
                .endpoint
                .clone()
                .context("stt.endpoint is required for the whisper-api provider")?;
            Arc::new(WhisperApiProvider::new(endpoint, cfg.stt.api_key.clone()))
        }
        other => anyhow::bail!("Unknown STT provider: {other}"),
    };
    info!("STT provider: {}", provider.name());

    let gateway = Arc::new(SttGateway::new(
        Arc::clone(&provider),
        Arc::clone(&chunks),
        cfg.audio.clone(),
        cfg.stt.language.clone(),
    ));

    let storage: Option<Arc<dyn ObjectStorage>> = match cfg.storage.storage_type.as_str() {
        "remote" => {
            let url = cfg
                .storage
                .remote_url
                .clone()
                .context("storage.remote_url is required for remote storage")?;
            Some(Arc::new(HttpObjectStorage::new(
                url,
                cfg.storage.remote_token.clone(),
            )))
        }
        _ => None,
    };

    let merge = Arc::new(MergePipeline::new(
        Arc::clone(&chunks),
        Arc::new(FfmpegEncoder),
        Path::new(&cfg.storage.storage_path).join("videos"),
        storage,
    ));

    let bus = EventBus::new();

    // Interview/response records are owned by the CRUD backend; the
    // standalone binary runs against in-memory stores
    let interviews = InMemoryDirectory::new();
    let responses = InMemoryResponses::new();

    let controller = Arc::new(SessionController::new(
        Arc::clone(&bus),
        chunks,
        gateway,
        interviews,
        responses,
        cfg.session.clone(),
    ));

    let state = AppState {
        controller,
        bus,
        merge,
    };
    let app = interview_live::create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
