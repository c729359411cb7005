//! Media Source (C2): resolves video metadata, captions, audio, and direct
//! URLs via an external downloader. Specified only as an interface per
//! spec.md §4.2/§6 — the core sees these four capabilities and the tagged
//! error/event vocabulary, never a concrete provider's quirks.
//!
//! Grounded on the teacher's `audio::downloader` (process spawning,
//! cached-file reuse, ffmpeg normalization) for the HOW; the live/caption/
//! progress surface is new, specified by spec.md §4.2 and
//! `original_source/live_flow.py`.

pub mod youtube;

pub use youtube::YtDlpMediaSource;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;

/// Live/upcoming/VOD classification returned by `probe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveStatus {
    Live,
    Upcoming,
    WasLive,
    None,
}

/// Metadata returned by `probe(url)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub live_status: LiveStatus,
    pub scheduled_start: Option<chrono::DateTime<chrono::Utc>>,
    pub duration: Option<f64>,
    pub has_captions: bool,
}

/// A single caption/subtitle line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Result of `download_captions`.
#[derive(Debug, Clone)]
pub struct CaptionsResult {
    pub segments: Vec<CaptionSegment>,
    pub title: String,
    pub caption_file_path: PathBuf,
}

/// What `direct_media_url` is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// A streamed progress event from `download_with_progress` (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgressEvent {
    pub percent: Option<f64>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub line: String,
    pub live_stats: Option<LiveStats>,
}

/// Stuck-detection inputs sampled from a live download's part file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStats {
    pub output_bytes: u64,
    pub output_mtime: chrono::DateTime<chrono::Utc>,
}

/// Cooperative stop signal for a single in-flight download, polled by the
/// downloader loop at sub-second granularity (spec.md §5).
#[derive(Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn request_stop(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// External collaborator contract consumed by the core (spec.md §4.2/§6).
///
/// Implementations are free to rotate client profiles, retry on
/// `ANTIBOT_BLOCKED`/"no formats found", and otherwise treat failures as
/// fatal to the call, per the retry policy in spec.md §4.2.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeResult>;

    async fn download_captions(&self, url: &str, workdir: &Path) -> Result<CaptionsResult>;

    /// Returns `(audio_path, title)`.
    async fn download_audio(&self, url: &str, workdir: &Path) -> Result<(PathBuf, String)>;

    /// Returns `(url, title)` of a temporary direct media URL.
    async fn direct_media_url(&self, url: &str, kind: MediaKind) -> Result<(String, String)>;

    /// Streams progress into `progress_tx` while downloading; raises one of
    /// the tagged `YtCoreError` variants on live-specific failure classes.
    #[allow(clippy::too_many_arguments)]
    async fn download_with_progress(
        &self,
        url: &str,
        video_id: &str,
        output_template: &Path,
        is_live: bool,
        extra_args: &[String],
        stop_signal: StopSignal,
        progress_tx: Sender<DownloadProgressEvent>,
    ) -> Result<PathBuf>;
}
