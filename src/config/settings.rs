//! Configuration settings for YtCore.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub transcription: TranscriptionSettings,
    pub embedding: EmbeddingSettings,
    pub prompts: PromptSettings,
    pub live: LiveSettings,
    pub research: ResearchSettings,
    pub qa: QaSettings,
    pub jobs: JobsSettings,
    pub providers: ProviderSettings,
}

/// Live/VOD recording supervisor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    /// Seconds without growth before a recording is considered stuck.
    pub stuck_timeout_sec: u64,
    /// Max wall-clock wait for an upcoming stream to start.
    pub upcoming_wait_sec: u64,
    /// Poll interval while waiting for an upcoming stream.
    pub upcoming_poll_sec: u64,
    /// Local hour that splits a calendar day into slot_1/slot_2.
    pub session_split_hour: u32,
    /// Whether the background full-replay retry task is enabled.
    pub enable_full_replay_retry: bool,
    /// How long (minutes) to keep retrying a full-replay download.
    pub full_replay_retry_minutes: u64,
    /// Interval (seconds) between full-replay retry attempts.
    pub full_replay_retry_interval_sec: u64,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            stuck_timeout_sec: 300,
            upcoming_wait_sec: 3600,
            upcoming_poll_sec: 15,
            session_split_hour: 17,
            enable_full_replay_retry: false,
            full_replay_retry_minutes: 360,
            full_replay_retry_interval_sec: 60,
        }
    }
}

/// Knowledge Juice research orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSettings {
    /// Default/clamped-minimum number of search queries to generate.
    pub max_queries: u32,
    /// Default/clamped-minimum number of candidate videos to keep.
    pub max_videos: u32,
    /// Reject videos shorter than this unless they have captions.
    pub min_duration_sec: u32,
    /// Reject videos longer than this unless they have captions.
    pub no_caption_max_duration_sec: u32,
    /// User-configurable hard cap on video duration (0 = no cap).
    pub max_duration_sec: u32,
    /// Only accept videos that have captions.
    pub captions_only: bool,
    /// Minimum confidence for a video to count as an "owner story".
    pub owner_confidence_min: f64,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            max_queries: 8,
            max_videos: 6,
            min_duration_sec: 90,
            no_caption_max_duration_sec: 600,
            max_duration_sec: 0,
            captions_only: false,
            owner_confidence_min: 0.55,
        }
    }
}

/// Retrieval & Q&A pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaSettings {
    /// Enable the LLM query planner (off by default per spec).
    pub enable_planner: bool,
    /// Enable the LLM rerank pass (off by default per spec).
    pub enable_rerank: bool,
    /// Number of top chunks selected before neighbor expansion.
    pub top_n: usize,
    /// Character budget for candidate text passed to the LLM.
    pub max_chars: usize,
    /// Max cached qa_cache entries retained per ArchiveRecord.
    pub max_cache_entries: usize,
    /// Hours an analysis stays fresh before recompute (VIDEO_AI_ANALYSIS_TTL_HOURS).
    pub analysis_ttl_hours: u32,
    /// Allow falling back to local lexical scoring when no LLM answers.
    pub allow_local_fallback: bool,
}

impl Default for QaSettings {
    fn default() -> Self {
        Self {
            enable_planner: false,
            enable_rerank: false,
            top_n: 6,
            max_chars: 6000,
            max_cache_entries: 40,
            analysis_ttl_hours: 24,
            allow_local_fallback: true,
        }
    }
}

/// Job registry / event bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsSettings {
    /// Broadcast channel capacity (events buffered per slow subscriber).
    pub broadcast_capacity: usize,
    /// Max candidate videos retained per brew job snapshot.
    pub max_candidate_videos: usize,
    /// Max reviewed-video rows retained per brew job snapshot.
    pub max_reviewed: usize,
    /// Max trailing log lines retained per job snapshot.
    pub max_log_lines: usize,
    /// Max component-test case rows retained per job snapshot.
    pub max_test_case_rows: usize,
}

impl Default for JobsSettings {
    fn default() -> Self {
        Self {
            broadcast_capacity: 256,
            max_candidate_videos: 24,
            max_reviewed: 60,
            max_log_lines: 220,
            max_test_case_rows: 400,
        }
    }
}

/// Provider-chain settings (chat/embedding backend priority + rate limits).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Chat backends attempted in order, e.g. ["local", "claude", "openai"].
    pub chat_chain: Vec<String>,
    /// Embedding backends attempted in order, e.g. ["openai", "local"].
    pub embedding_chain: Vec<String>,
    /// Claude requests-per-minute cap for the client-side token bucket.
    pub claude_rpm: u32,
    /// Per-provider call timeout in seconds.
    pub timeout_sec: u64,
    /// Retries per provider on transient (429/5xx/timeout) errors.
    pub max_retries: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            chat_chain: vec!["openai".to_string()],
            embedding_chain: vec!["openai".to_string()],
            claude_rpm: 5,
            timeout_sec: 30,
            max_retries: 2,
        }
    }
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for temporary files.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.ytcore".to_string(),
            temp_dir: "/tmp/ytcore".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Transcription provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    /// OpenAI Whisper (default, single model).
    #[default]
    Whisper,
    /// Fusion mode: Whisper timestamps + GPT-4o text + LLM fusion.
    Fusion,
}

impl std::str::FromStr for TranscriptionProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whisper" | "openai" => Ok(TranscriptionProvider::Whisper),
            "fusion" => Ok(TranscriptionProvider::Fusion),
            _ => Err(format!("Unknown transcription provider: {}", s)),
        }
    }
}

impl std::fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionProvider::Whisper => write!(f, "whisper"),
            TranscriptionProvider::Fusion => write!(f, "fusion"),
        }
    }
}

/// Settings for the transcription processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionProcessingSettings {
    /// Model for word-level timestamps (default: whisper-1).
    pub timestamp_model: String,
    /// Model for secondary text transcription. None = Whisper-only with cleanup.
    pub text_model: Option<String>,
    /// Model for LLM cleanup and segment structuring (default: gpt-4.1).
    pub cleanup_model: String,
    /// Maximum concurrent API calls.
    pub max_concurrent: usize,
}

impl Default for TranscriptionProcessingSettings {
    fn default() -> Self {
        Self {
            timestamp_model: "whisper-1".to_string(),
            text_model: Some("gpt-4o-transcribe".to_string()),
            cleanup_model: "gpt-4.1".to_string(),
            max_concurrent: 2,
        }
    }
}

impl TranscriptionProcessingSettings {
    /// Check if secondary text model is enabled (full fusion mode).
    pub fn has_text_model(&self) -> bool {
        self.text_model.as_ref().is_some_and(|m| !m.is_empty())
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Transcription provider (whisper, fusion).
    pub provider: TranscriptionProvider,
    /// Whisper model to use (for whisper provider or fusion timestamps).
    pub model: String,
    /// Duration in seconds for splitting long audio files.
    pub chunk_duration_seconds: u32,
    /// Maximum media duration to process (in seconds).
    pub max_duration_seconds: u32,
    /// Maximum concurrent chunk processing.
    pub max_concurrent_chunks: usize,
    /// Processing pipeline settings (cleanup model, text model, etc.).
    pub processing: TranscriptionProcessingSettings,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: TranscriptionProvider::Whisper,
            model: "whisper-1".to_string(),
            chunk_duration_seconds: 120,
            max_duration_seconds: 7200, // 2 hours
            max_concurrent_chunks: 3,
            processing: TranscriptionProcessingSettings::default(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}


impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::YtCoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ytcore")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded path to the archive database.
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir().join("ytcore.sqlite3")
    }
}
