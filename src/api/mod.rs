//! HTTP/WebSocket API Surface (C10): generalizes the teacher's
//! `cli::commands::serve` axum router (`State<Arc<AppState>>`, CORS layer,
//! `Json` request/response structs, `IntoResponse` error mapping) to the
//! full route list in spec.md §6, plus a `/ws` event-fanout channel.

mod routes;
mod ws;

use crate::analysis::AnalysisEngine;
use crate::config::{Prompts, Settings};
use crate::error::{YtCoreError, Result};
use crate::jobs::JobRegistry;
use crate::live::LiveSupervisor;
use crate::media::{MediaSource, YtDlpMediaSource};
use crate::providers::{ChatChain, EmbedChain};
use crate::qa::QaEngine;
use crate::research::ResearchEngine;
use crate::search::{VideoSearch, YtDlpVideoSearch};
use crate::store::StateStore;
use crate::transcript::TranscriptBuilder;
use crate::transcription::{Transcriber, TranscriptionProcessor, WhisperTranscriber};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Everything a request handler needs, composed once at startup from the
/// C1-C9 engines and shared behind `Arc` across connections.
pub struct AppState {
    pub store: Arc<StateStore>,
    pub media: Arc<dyn MediaSource>,
    pub transcripts: Arc<TranscriptBuilder>,
    pub chat: Arc<ChatChain>,
    pub qa: Arc<QaEngine>,
    pub analysis: Arc<AnalysisEngine>,
    pub live: Arc<LiveSupervisor>,
    pub research: Arc<ResearchEngine>,
    pub jobs: Arc<JobRegistry>,
    pub settings: Settings,
}

/// Build every collaborator from `settings` and wire them into `AppState`.
///
/// Mirrors the teacher's `run_serve` bootstrap shape (build collaborators,
/// wrap in `Arc`, build the router, bind, serve) but against the full C1-C10
/// collaborator graph instead of a single `Orchestrator`.
pub fn build_state(settings: Settings) -> Result<Arc<AppState>> {
    let data_dir = settings.data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let store = Arc::new(StateStore::new(&settings.sqlite_path())?);

    let media: Arc<dyn MediaSource> = Arc::new(YtDlpMediaSource::new());
    let search: Arc<dyn VideoSearch> = Arc::new(YtDlpVideoSearch::new());

    let transcriber: Arc<dyn Transcriber> = match settings.transcription.provider {
        crate::config::TranscriptionProvider::Fusion => Arc::new(TranscriptionProcessor::with_config(
            &settings.transcription.processing,
            &Prompts::default().cleanup.system,
        )?),
        crate::config::TranscriptionProvider::Whisper => Arc::new(WhisperTranscriber::new()?),
    };
    let transcripts = Arc::new(TranscriptBuilder::new(media.clone(), transcriber, &data_dir));

    let chat = Arc::new(ChatChain::from_names(&settings.providers.chat_chain, &settings.providers));
    let embed = Arc::new(EmbedChain::from_names(
        &settings.providers.embedding_chain,
        &settings.providers,
        settings.embedding.dimensions as usize,
    ));
    let primary_is_local = settings.providers.chat_chain.first().map(|s| s == "local").unwrap_or(true);

    let qa_model = settings.providers.chat_chain.first().cloned().unwrap_or_else(|| "gpt-4o-mini".to_string());
    let embed_model = settings.embedding.model.clone();
    let qa = Arc::new(QaEngine::new(
        store.clone(),
        chat.clone(),
        embed,
        qa_model.clone(),
        embed_model,
        settings.qa.clone(),
        &data_dir,
    ));
    let analysis = Arc::new(AnalysisEngine::new(chat.clone(), qa_model.clone(), primary_is_local));

    let live = Arc::new(LiveSupervisor::new(store.clone(), media.clone(), settings.live.clone(), data_dir.clone()));
    let research = Arc::new(ResearchEngine::new(
        store.clone(),
        chat.clone(),
        search,
        transcripts.clone(),
        qa_model,
        settings.research.clone(),
    ));
    let jobs = Arc::new(JobRegistry::new(&settings.jobs));

    Ok(Arc::new(AppState { store, media, transcripts, chat, qa, analysis, live, research, jobs, settings }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/runtime", get(routes::runtime))
        .route("/api/videos", get(routes::videos))
        .route("/api/video", get(routes::video))
        .route("/api/researches", get(routes::researches))
        .route("/api/research", get(routes::research))
        .route("/api/knowledge_juice", get(routes::knowledge_juice_get))
        .route("/api/knowledge_juice/jobs", get(routes::knowledge_juice_jobs))
        .route("/api/knowledge_juice/job", get(routes::knowledge_juice_job))
        .route("/api/component_tests/jobs", get(routes::component_test_jobs))
        .route("/api/component_tests/job", get(routes::component_test_job))
        .route("/api/analyze_progress", get(routes::analyze_progress))
        .route("/api/save_transcript", post(routes::save_transcript))
        .route("/api/analyze", post(routes::analyze))
        .route("/api/ask", post(routes::ask))
        .route("/api/clear_history", post(routes::clear_history))
        .route("/api/direct_video", post(routes::direct_video))
        .route("/api/direct_audio", post(routes::direct_audio))
        .route("/api/direct_save_server", post(routes::direct_save_server))
        .route("/api/live/start", post(routes::live_start))
        .route("/api/live/stop", post(routes::live_stop))
        .route("/api/knowledge_juice", post(routes::knowledge_juice_post))
        .route("/api/knowledge_juice/start", post(routes::knowledge_juice_start))
        .route("/api/component_tests/start", post(routes::component_tests_start))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP/WebSocket API server until the process is killed.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let state = build_state(settings)?;
    let app = router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("ytcore API listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Uniform JSON error envelope: `{"ok": false, "error": "..."}`.
pub struct ApiError(pub YtCoreError);

impl From<YtCoreError> for ApiError {
    fn from(e: YtCoreError) -> Self {
        ApiError(e)
    }
}

/// Maps error kinds to status codes per spec.md §7: `UserInput` is a client
/// mistake (400); everything else surfaced through this path is either a
/// degrade-and-report condition (200 with `ok:false`, handled by callers
/// directly) or a genuine failure the caller didn't special-case (500).
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            YtCoreError::UserInput(_) | YtCoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            YtCoreError::VideoNotFound(_) | YtCoreError::NoTranscript | YtCoreError::NoCaptions => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"ok": false, "error": self.0.to_string()}))).into_response()
    }
}

pub(crate) fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError(YtCoreError::UserInput(msg.into()))
}
