//! `ytcore serve` - runs the HTTP/WebSocket API (spec.md §4.10, §6): live
//! recording, transcripts, grounded Q&A, Knowledge Juice jobs and the
//! shared archive, all fronted by the router built in [`crate::api`].

use crate::api;
use crate::cli::Output;
use crate::config::Settings;

/// Build the full collaborator graph and serve until the process is killed.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    Output::header("YtCore API Server");
    println!();
    Output::success(&format!("Listening on http://{host}:{port}"));
    println!();
    println!("Endpoints:");
    Output::kv("Runtime", "GET  /api/runtime");
    Output::kv("Videos", "GET  /api/videos");
    Output::kv("Video", "GET  /api/video?video_id=");
    Output::kv("Researches", "GET  /api/researches");
    Output::kv("Research", "GET  /api/research?run_id=");
    Output::kv("Knowledge Juice", "GET|POST /api/knowledge_juice");
    Output::kv("Knowledge Juice jobs", "GET  /api/knowledge_juice/jobs");
    Output::kv("Knowledge Juice start", "POST /api/knowledge_juice/start");
    Output::kv("Component tests", "GET|POST /api/component_tests/*");
    Output::kv("Save transcript", "POST /api/save_transcript");
    Output::kv("Analyze", "POST /api/analyze");
    Output::kv("Ask", "POST /api/ask");
    Output::kv("Live start/stop", "POST /api/live/start, /api/live/stop");
    Output::kv("Events", "WS   /ws");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    api::run_serve(host, port, settings).await
}
