//! Transcript Builder (C3): turns captions or STT segments into the
//! canonical timestamped transcript file, caption-preferred with an
//! audio-STT fallback.
//!
//! Uses `transcription::format` for the header/body serialization
//! convention; adds a reuse-cached/caption-then-stt policy on top of it.

use crate::error::{YtCoreError, Result};
use crate::media::MediaSource;
use crate::store::TranscriptSource;
use crate::transcription::{Transcriber, Transcript, TranscriptSegment};
use chrono::Utc;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of `build_transcript`.
#[derive(Debug, Clone)]
pub struct BuildTranscriptResult {
    pub transcript_path: PathBuf,
    pub title: String,
    pub source: TranscriptSource,
    pub chars: u64,
}

pub struct TranscriptBuilder {
    media: Arc<dyn MediaSource>,
    transcriber: Arc<dyn Transcriber>,
    transcripts_dir: PathBuf,
}

impl TranscriptBuilder {
    pub fn new(media: Arc<dyn MediaSource>, transcriber: Arc<dyn Transcriber>, data_dir: &Path) -> Self {
        Self {
            media,
            transcriber,
            transcripts_dir: data_dir.join("transcripts"),
        }
    }

    fn path_for(&self, video_id: &str) -> PathBuf {
        self.transcripts_dir.join(format!("{video_id}.txt"))
    }

    /// Reuses the cached file if present and non-empty.
    fn cached(&self, video_id: &str) -> Option<(PathBuf, String)> {
        let path = self.path_for(video_id);
        let meta = std::fs::metadata(&path).ok()?;
        if meta.len() == 0 {
            return None;
        }
        let content = std::fs::read_to_string(&path).ok()?;
        Some((path, content))
    }

    #[instrument(skip(self, title_hint, local_video_path))]
    pub async fn build_transcript(
        &self,
        video_id: &str,
        url: &str,
        title_hint: &str,
        local_video_path: Option<&Path>,
    ) -> Result<BuildTranscriptResult> {
        if let Some((path, content)) = self.cached(video_id) {
            let title = parse_header_title(&content).unwrap_or_else(|| title_hint.to_string());
            info!("reusing cached transcript for {video_id}");
            return Ok(BuildTranscriptResult {
                transcript_path: path,
                title,
                source: TranscriptSource::Cached,
                chars: content.len() as u64,
            });
        }

        std::fs::create_dir_all(&self.transcripts_dir)?;

        // Caption path first.
        let caption_attempt = self.media.download_captions(url, &self.transcripts_dir).await;
        if let Ok(result) = caption_attempt {
            let segments: Vec<TranscriptSegment> = result
                .segments
                .iter()
                .map(|s| TranscriptSegment::new(s.start, s.end, s.text.clone()))
                .collect();
            let title = if result.title.trim().is_empty() { title_hint.to_string() } else { result.title };
            let path = self.write_canonical(video_id, &title, &segments)?;
            let chars = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            return Ok(BuildTranscriptResult {
                transcript_path: path,
                title,
                source: TranscriptSource::YoutubeCaptions,
                chars,
            });
        }

        // Audio-STT fallback.
        let audio_path = if let Some(local) = local_video_path {
            local.to_path_buf()
        } else {
            let (path, _title) = self.media.download_audio(url, &self.transcripts_dir).await?;
            path
        };

        let transcript: Transcript = self.transcriber.transcribe(&audio_path).await?;
        if transcript.segments.is_empty() {
            return Err(YtCoreError::NoTranscript);
        }

        let path = self.write_canonical(video_id, title_hint, &transcript.segments)?;
        let chars = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Ok(BuildTranscriptResult {
            transcript_path: path,
            title: title_hint.to_string(),
            source: TranscriptSource::AudioStt,
            chars,
        })
    }

    /// Never partially overwrites an existing file: builds the full
    /// content in memory, then does a single atomic write.
    fn write_canonical(&self, video_id: &str, title: &str, segments: &[TranscriptSegment]) -> Result<PathBuf> {
        let path = self.path_for(video_id);
        let body = render_canonical(title, video_id, segments);
        let tmp_path = path.with_extension("txt.tmp");
        std::fs::write(&tmp_path, body)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(path)
    }
}

/// Header (`Title:`, `Video ID:`, `Generated:`), blank line, then
/// `[mm:ss] text` body lines in insertion order.
fn render_canonical(title: &str, video_id: &str, segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Title: {title}\n"));
    out.push_str(&format!("Video ID: {video_id}\n"));
    out.push_str(&format!("Generated: {}\n", Utc::now().to_rfc3339()));
    out.push('\n');
    for seg in segments {
        out.push_str(&format!("[{}] {}\n", format_mmss(seg.start_seconds), seg.text));
    }
    out
}

fn format_mmss(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn parse_header_title(content: &str) -> Option<String> {
    let line = content.lines().find(|l| l.starts_with("Title:"))?;
    Some(line.trim_start_matches("Title:").trim().to_string())
}

/// Re-parses a canonical transcript file's body lines back into segments,
/// used by the Q&A evidence-verification pass.
pub fn parse_canonical_body(content: &str) -> Vec<(String, String)> {
    let line_re = Regex::new(r"^\[(\d{2}:\d{2})\]\s?(.*)$").expect("valid regex");
    content
        .lines()
        .skip_while(|l| !l.trim().is_empty())
        .skip(1)
        .filter_map(|l| {
            line_re.captures(l).map(|c| (c[1].to_string(), c[2].to_string()))
        })
        .collect()
}

/// `"<mtime_ns>:<size>"` of the canonical transcript file — the Q&A cache
/// invalidation key.
pub fn transcript_stamp(path: &Path) -> Result<String> {
    let meta = std::fs::metadata(path)?;
    let mtime_ns = meta
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    Ok(format!("{mtime_ns}:{}", meta.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_format_has_header_then_body() {
        let segments = vec![TranscriptSegment::new(5.0, 10.0, "hello".to_string())];
        let rendered = render_canonical("My Title", "v1", &segments);
        let mut lines = rendered.lines();
        assert_eq!(lines.next().unwrap(), "Title: My Title");
        assert_eq!(lines.next().unwrap(), "Video ID: v1");
        assert!(lines.next().unwrap().starts_with("Generated:"));
        assert_eq!(lines.next().unwrap(), "");
        assert_eq!(lines.next().unwrap(), "[00:05] hello");
    }

    #[test]
    fn parse_canonical_body_recovers_lines() {
        let segments = vec![
            TranscriptSegment::new(0.0, 2.0, "first".to_string()),
            TranscriptSegment::new(65.0, 70.0, "second".to_string()),
        ];
        let rendered = render_canonical("t", "v1", &segments);
        let parsed = parse_canonical_body(&rendered);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].0, "01:05");
        assert_eq!(parsed[1].1, "second");
    }

    #[test]
    fn header_title_round_trips() {
        let rendered = render_canonical("Some Title", "v1", &[]);
        assert_eq!(parse_header_title(&rendered), Some("Some Title".to_string()));
    }
}
