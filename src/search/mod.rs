//! Video search provider: resolves a free-text query to ranked video
//! candidates for the Knowledge Juice pipeline (spec.md §4.8 step 3).
//!
//! New relative to the teacher (no search capability exists today);
//! grounded on `original_source/market_research.py`'s `_search_youtube_videos`
//! (`ytsearchN:` pseudo-URL probing via `--dump-single-json`) and
//! `_video_popularity_score`, adapted to the yt-dlp subprocess conventions of
//! `media::youtube::YtDlpMediaSource`.

use crate::error::{YtCoreError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::instrument;

/// One search result's raw metadata, ahead of popularity scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub video_id: String,
    pub url: String,
    pub title: String,
    pub channel: String,
    pub view_count: i64,
    pub follower_count: i64,
    pub published_utc: String,
    pub duration_sec: i64,
    pub thumbnail_url: String,
    pub has_captions: bool,
    pub meta: serde_json::Value,
}

#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>>;
}

pub struct YtDlpVideoSearch;

impl YtDlpVideoSearch {
    pub fn new() -> Self {
        Self
    }
}

impl Default for YtDlpVideoSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoSearch for YtDlpVideoSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>> {
        let pseudo_url = format!("ytsearch{}:{}", max_results.max(1), query);
        let output = Command::new("yt-dlp")
            .args(["--dump-single-json", "--no-warnings", &pseudo_url])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    YtCoreError::ToolNotFound("yt-dlp".to_string())
                } else {
                    YtCoreError::ToolFailed(format!("yt-dlp: {e}"))
                }
            })?;

        if !output.status.success() {
            // Search failures are transient (rate limiting, network) rather
            // than a hard stop for the candidate-collection loop.
            return Ok(Vec::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let payload: serde_json::Value = match serde_json::from_str(&stdout) {
            Ok(v) => v,
            Err(_) => return Ok(Vec::new()),
        };
        let entries = match payload["entries"].as_array() {
            Some(e) => e,
            None => return Ok(Vec::new()),
        };

        Ok(entries.iter().filter_map(entry_to_result).collect())
    }
}

fn entry_to_result(item: &serde_json::Value) -> Option<SearchResult> {
    let video_id = item["id"].as_str().unwrap_or_default().trim().to_string();
    if video_id.is_empty() {
        return None;
    }
    let url = item["webpage_url"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={video_id}"));
    let title = item["title"].as_str().unwrap_or_default().trim().to_string();
    let channel = item["channel"]
        .as_str()
        .or_else(|| item["uploader"].as_str())
        .unwrap_or_default()
        .trim()
        .to_string();
    let view_count = item["view_count"].as_i64().unwrap_or(0);
    let follower_count = item["channel_follower_count"].as_i64().unwrap_or(0);
    let published_utc = item["upload_date"]
        .as_str()
        .or_else(|| item["release_date"].as_str())
        .unwrap_or_default()
        .trim()
        .to_string();
    let duration_sec = item["duration"].as_f64().map(|d| d as i64).unwrap_or(0);
    let thumbnail_url = item["thumbnail"]
        .as_str()
        .or_else(|| item["thumbnails"].as_array().and_then(|t| t.first()).and_then(|t| t["url"].as_str()))
        .unwrap_or_default()
        .trim()
        .to_string();
    let has_captions = caption_state_from_meta(item);

    Some(SearchResult {
        video_id,
        url,
        title,
        channel,
        view_count,
        follower_count,
        published_utc,
        duration_sec,
        thumbnail_url,
        has_captions,
        meta: item.clone(),
    })
}

/// Whether `subtitles`/`automatic_captions` metadata indicates captions
/// exist, without a network probe (spec.md §4.8 step 3 caption override).
fn caption_state_from_meta(meta: &serde_json::Value) -> bool {
    for key in ["subtitles", "automatic_captions", "requested_subtitles"] {
        if let Some(obj) = meta[key].as_object() {
            return !obj.is_empty();
        }
    }
    false
}

/// `0.55·log1p(views)/16 + 0.15·log1p(followers)/16 + 0.20·recency + 0.10·duration_shape`
/// (spec.md §4.8 step 3), grounded on `market_research.py::_video_popularity_score`.
pub fn popularity_score(result: &SearchResult, now: DateTime<Utc>) -> f64 {
    let view_term = (((result.view_count.max(0)) as f64).ln_1p() / 16.0).min(1.0);
    let follower_term = (((result.follower_count.max(0)) as f64).ln_1p() / 16.0).min(1.0);

    let duration_term = if result.duration_sec > 0 {
        ((result.duration_sec as f64 - 180.0) / 1800.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let recency_term = match parse_upload_date(&result.published_utc) {
        Some(uploaded) => {
            let days = (now - uploaded).num_seconds().max(0) as f64 / 86400.0;
            (1.0 / (1.0 + days / 180.0)).clamp(0.1, 1.0)
        }
        None => 0.5,
    };

    0.55 * view_term + 0.15 * follower_term + 0.20 * recency_term + 0.10 * duration_term
}

fn parse_upload_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() == 8 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        let date = NaiveDate::parse_from_str(trimmed, "%Y%m%d").ok()?;
        return Some(DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0)?, Utc));
    }
    DateTime::parse_from_rfc3339(trimmed).map(|d| d.with_timezone(&Utc)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(view_count: i64, follower_count: i64, duration_sec: i64, published_utc: &str) -> SearchResult {
        SearchResult {
            video_id: "v1".to_string(),
            url: String::new(),
            title: String::new(),
            channel: String::new(),
            view_count,
            follower_count,
            published_utc: published_utc.to_string(),
            duration_sec,
            thumbnail_url: String::new(),
            has_captions: false,
            meta: serde_json::json!({}),
        }
    }

    #[test]
    fn popularity_increases_with_views() {
        let now = Utc::now();
        let low = popularity_score(&result(10, 0, 0, ""), now);
        let high = popularity_score(&result(1_000_000, 0, 0, ""), now);
        assert!(high > low);
    }

    #[test]
    fn recency_term_decays_for_old_uploads() {
        let now = Utc::now();
        let recent = result(1000, 0, 0, &now.format("%Y%m%d").to_string());
        let old = result(1000, 0, 0, "20100101");
        assert!(popularity_score(&recent, now) > popularity_score(&old, now));
    }

    #[test]
    fn missing_publish_date_falls_back_to_neutral_recency() {
        assert_eq!(parse_upload_date(""), None);
    }

    #[test]
    fn eight_digit_date_parses_as_utc_midnight() {
        let parsed = parse_upload_date("20230615").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2023-06-15");
    }
}
