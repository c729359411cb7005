//! Typed rows for the State Store (C1).
//!
//! `ArchiveRecord` is kept as a single typed struct serialized to a JSON
//! column rather than split across many narrow columns, matching the
//! original's "record blob" pragmatism while staying statically typed at
//! every call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a recorded/archived video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveStatus {
    Recording,
    Saved,
    Partial,
    Stopped,
    Failed,
}

/// Source a canonical transcript was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    YoutubeCaptions,
    AudioStt,
    Cached,
    File,
}

/// Detected/forced analysis output language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisLang {
    Uk,
    En,
}

/// A single cached Q&A answer, keyed by `(question_key, transcript_stamp)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaCacheEntry {
    pub question_key: String,
    pub transcript_stamp: String,
    pub answer: String,
    pub backend: String,
    pub saved_at: DateTime<Utc>,
}

/// Which of the two daily recording buckets a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKey {
    Slot1,
    Slot2,
}

impl ServiceKey {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceKey::Slot1 => "slot_1",
            ServiceKey::Slot2 => "slot_2",
        }
    }
}

/// Classify a local start time into a session bucket.
///
/// `slot_1` iff `hour < split_hour`, else `slot_2` (spec.md §8 invariant 7).
pub fn classify_service_by_start(hour: u32, split_hour: u32) -> ServiceKey {
    if hour < split_hour {
        ServiceKey::Slot1
    } else {
        ServiceKey::Slot2
    }
}

/// Persisted per-video archive record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub source_url: String,
    pub status: ArchiveStatus,
    pub started_utc: Option<DateTime<Utc>>,
    pub started_local: Option<String>,
    pub date_key: Option<String>,
    pub service_key: Option<ServiceKey>,
    pub filename: Option<String>,
    pub full_filename: Option<String>,
    pub public_url: Option<String>,
    pub full_public_url: Option<String>,
    pub transcript_path: Option<String>,
    pub transcript_source: Option<TranscriptSource>,
    pub transcript_chars: u64,
    pub analysis_text: Option<String>,
    pub analysis_lang: Option<AnalysisLang>,
    pub analysis_saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub qa_cache: Vec<QaCacheEntry>,
}

impl ArchiveRecord {
    pub fn new(video_id: impl Into<String>, title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            channel: String::new(),
            source_url: source_url.into(),
            status: ArchiveStatus::Recording,
            started_utc: None,
            started_local: None,
            date_key: None,
            service_key: None,
            filename: None,
            full_filename: None,
            public_url: None,
            full_public_url: None,
            transcript_path: None,
            transcript_source: None,
            transcript_chars: 0,
            analysis_text: None,
            analysis_lang: None,
            analysis_saved_at: None,
            qa_cache: Vec::new(),
        }
    }

    /// Push a cache entry, bounding the list to `max_entries` (drop oldest first).
    pub fn push_qa_cache(&mut self, entry: QaCacheEntry, max_entries: usize) {
        self.qa_cache.push(entry);
        if self.qa_cache.len() > max_entries {
            let overflow = self.qa_cache.len() - max_entries;
            self.qa_cache.drain(0..overflow);
        }
    }

    /// Find a cache hit matching both the question key and transcript stamp.
    pub fn find_qa_cache(&self, question_key: &str, transcript_stamp: &str) -> Option<&QaCacheEntry> {
        self.qa_cache
            .iter()
            .rev()
            .find(|e| e.question_key == question_key && e.transcript_stamp == transcript_stamp)
    }

    /// Whether `transcript_path` points at an existing non-empty file.
    /// Per spec.md §3 invariant: callers MUST treat the record as
    /// transcript-less when this is false, even if the field is set.
    pub fn has_usable_transcript(&self) -> bool {
        match &self.transcript_path {
            Some(p) => std::fs::metadata(p).map(|m| m.len() > 0).unwrap_or(false),
            None => false,
        }
    }
}

/// Intent extracted for a research run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchIntent {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub target_region: String,
    #[serde(default)]
    pub target_language: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub success_signals: Vec<String>,
    #[serde(default)]
    pub run_kind: ResearchRunKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchRunKind {
    #[default]
    Research,
    KnowledgeJuice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Similarities/differences/recommendations/owner-matches summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchSummary {
    #[serde(default)]
    pub similarities: Vec<String>,
    #[serde(default)]
    pub differences: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub owner_matches: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRun {
    pub run_id: String,
    pub chat_id: i64,
    pub goal_text: String,
    pub is_public: bool,
    pub intent: ResearchIntent,
    pub status: RunStatus,
    pub report_text: String,
    pub summary: ResearchSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchVideo {
    pub run_id: String,
    pub video_id: String,
    pub rank: i64,
    pub url: String,
    pub title: String,
    pub channel: String,
    pub view_count: i64,
    pub published_utc: String,
    pub popularity_score: f64,
    pub transcript_path: String,
    pub transcript_source: String,
    pub transcript_chars: i64,
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchVideoFact {
    pub run_id: String,
    pub video_id: String,
    pub is_owner_story: Option<bool>,
    pub confidence: f64,
    pub business_model: String,
    pub facts: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTopic {
    pub tag: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedTopic {
    pub tag: String,
    pub run_count: i64,
    pub max_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaHistoryEntry {
    pub video_id: String,
    pub transcript_path: String,
    pub question: String,
    pub answer: String,
    pub source: String,
    pub chat_id: Option<i64>,
    pub lang: String,
    pub extra: serde_json::Value,
    pub asked_at: DateTime<Utc>,
}

/// A chunk persisted for semantic search (C1's view of C4's output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub idx: i64,
    pub start_ts: f64,
    pub end_ts: f64,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_key_boundary() {
        assert_eq!(classify_service_by_start(16, 17), ServiceKey::Slot1);
        assert_eq!(classify_service_by_start(17, 17), ServiceKey::Slot2);
        assert_eq!(classify_service_by_start(0, 17), ServiceKey::Slot1);
        assert_eq!(classify_service_by_start(23, 17), ServiceKey::Slot2);
    }

    #[test]
    fn qa_cache_bounds_and_order() {
        let mut rec = ArchiveRecord::new("v1", "t", "u");
        for i in 0..45 {
            rec.push_qa_cache(
                QaCacheEntry {
                    question_key: format!("q{i}"),
                    transcript_stamp: "s".into(),
                    answer: "a".into(),
                    backend: "local".into(),
                    saved_at: Utc::now(),
                },
                40,
            );
        }
        assert_eq!(rec.qa_cache.len(), 40);
        assert_eq!(rec.qa_cache[0].question_key, "q5");
    }

    #[test]
    fn transcript_less_when_file_missing() {
        let mut rec = ArchiveRecord::new("v1", "t", "u");
        rec.transcript_path = Some("/nonexistent/path/for/test.txt".into());
        assert!(!rec.has_usable_transcript());
    }
}
