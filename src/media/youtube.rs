//! yt-dlp-backed `MediaSource`.
//!
//! Grounded on `audio::downloader::download_audio` for cached-file reuse
//! and process-spawn conventions, generalized here to `--dump-json`
//! metadata probing. The live-progress parser and tagged-error mapping are
//! new, grounded on `original_source/live_flow.py`'s stdout heuristics
//! (spec.md §4.2/§6).

use super::{
    CaptionSegment, CaptionsResult, DownloadProgressEvent, LiveStats, LiveStatus, MediaKind,
    MediaSource, ProbeResult, StopSignal,
};
use crate::error::{YtCoreError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::Sender;
use tracing::{instrument, warn};

/// Client profiles rotated on `ANTIBOT_BLOCKED`/"no formats found", in
/// order, with linear backoff between attempts (spec.md §4.2 retry policy).
const CLIENT_PROFILES: &[&str] = &["web", "android", "ios", "tv_embedded"];

pub struct YtDlpMediaSource {
    max_retries: u32,
}

impl YtDlpMediaSource {
    pub fn new() -> Self {
        Self { max_retries: CLIENT_PROFILES.len() as u32 }
    }

    async fn probe_json(&self, url: &str, client: &str) -> Result<serde_json::Value> {
        let output = Command::new("yt-dlp")
            .args([
                "--dump-json",
                "--no-download",
                "--no-warnings",
                "--extractor-args",
                &format!("youtube:player_client={client}"),
                url,
            ])
            .output()
            .await
            .map_err(|e| map_spawn_err(e, "yt-dlp"))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() || stdout.trim().is_empty() {
            return Err(classify_probe_failure(&stderr));
        }
        serde_json::from_str(&stdout)
            .map_err(|e| YtCoreError::ProviderContract(format!("yt-dlp json: {e}")))
    }
}

impl Default for YtDlpMediaSource {
    fn default() -> Self {
        Self::new()
    }
}

fn map_spawn_err(e: std::io::Error, tool: &str) -> YtCoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        YtCoreError::ToolNotFound(tool.to_string())
    } else {
        YtCoreError::ToolFailed(format!("{tool}: {e}"))
    }
}

/// Map yt-dlp stderr text to the spec's tagged failure classes.
fn classify_probe_failure(stderr: &str) -> YtCoreError {
    let lower = stderr.to_lowercase();
    if lower.contains("private") {
        YtCoreError::SourceUnavailable("This video is private or unavailable.".to_string())
    } else if lower.contains("sign in to confirm") || lower.contains("not a bot") {
        YtCoreError::SourceUnavailable(
            "YouTube flagged this request as bot traffic (anti-bot block).".to_string(),
        )
    } else if lower.contains("no video formats found") {
        YtCoreError::SourceUnavailable("No downloadable formats were found for this video.".to_string())
    } else {
        YtCoreError::VideoSource(format!("yt-dlp probe failed: {stderr}"))
    }
}

fn parse_live_status(json: &serde_json::Value) -> LiveStatus {
    match json["live_status"].as_str() {
        Some("is_live") => LiveStatus::Live,
        Some("is_upcoming") => LiveStatus::Upcoming,
        Some("was_live") | Some("post_live") => LiveStatus::WasLive,
        _ => LiveStatus::None,
    }
}

#[async_trait]
impl MediaSource for YtDlpMediaSource {
    #[instrument(skip(self))]
    async fn probe(&self, url: &str) -> Result<ProbeResult> {
        let json = self.probe_json(url, "web").await?;

        let id = json["id"].as_str().unwrap_or_default().to_string();
        if id.is_empty() {
            return Err(YtCoreError::InvalidInput(format!("could not resolve a video id from {url}")));
        }

        let title = json["title"].as_str().unwrap_or("Unknown Title").to_string();
        let channel = json["channel"]
            .as_str()
            .or_else(|| json["uploader"].as_str())
            .unwrap_or_default()
            .to_string();
        let duration = json["duration"].as_f64();
        let has_captions = json["subtitles"]
            .as_object()
            .map(|m| m.contains_key("en"))
            .unwrap_or(false)
            || json["automatic_captions"]
                .as_object()
                .map(|m| m.contains_key("en"))
                .unwrap_or(false);

        let scheduled_start = json["release_timestamp"]
            .as_i64()
            .or_else(|| json["live_status_release_timestamp"].as_i64())
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0));

        Ok(ProbeResult {
            id,
            title,
            channel,
            live_status: parse_live_status(&json),
            scheduled_start,
            duration,
            has_captions,
        })
    }

    #[instrument(skip(self, workdir))]
    async fn download_captions(&self, url: &str, workdir: &Path) -> Result<CaptionsResult> {
        std::fs::create_dir_all(workdir)?;
        let probe = self.probe(url).await?;
        if !probe.has_captions {
            return Err(YtCoreError::NoCaptions);
        }

        let template = workdir.join(format!("{}.%(ext)s", probe.id));
        let output = Command::new("yt-dlp")
            .args([
                "--skip-download",
                "--write-subs",
                "--write-auto-subs",
                "--sub-lang",
                "en.*,en",
                "--sub-format",
                "vtt",
                "--convert-subs",
                "vtt",
                "--no-warnings",
                "--output",
            ])
            .arg(&template)
            .arg(url)
            .output()
            .await
            .map_err(|e| map_spawn_err(e, "yt-dlp"))?;

        if !output.status.success() {
            return Err(YtCoreError::NoCaptions);
        }

        let caption_file_path = find_vtt_file(workdir, &probe.id).ok_or(YtCoreError::NoCaptions)?;
        let vtt = std::fs::read_to_string(&caption_file_path)?;
        let segments = parse_vtt(&vtt);
        if segments.is_empty() {
            return Err(YtCoreError::NoCaptions);
        }

        Ok(CaptionsResult { segments, title: probe.title, caption_file_path })
    }

    #[instrument(skip(self, workdir))]
    async fn download_audio(&self, url: &str, workdir: &Path) -> Result<(PathBuf, String)> {
        let probe = self.probe(url).await?;
        let mut last_err = None;
        for client in CLIENT_PROFILES.iter().take(self.max_retries.max(1) as usize) {
            match crate::audio::download_audio(url, &probe.id, workdir).await {
                Ok(path) => return Ok((path, probe.title)),
                Err(e) => {
                    warn!("audio download with client profile '{client}' failed: {e}");
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| YtCoreError::AudioDownload("all client profiles failed".to_string())))
    }

    #[instrument(skip(self))]
    async fn direct_media_url(&self, url: &str, kind: MediaKind) -> Result<(String, String)> {
        let format_arg = match kind {
            MediaKind::Video => "best",
            MediaKind::Audio => "bestaudio",
        };
        let probe = self.probe(url).await?;
        let output = Command::new("yt-dlp")
            .args(["-g", "-f", format_arg, "--no-warnings", url])
            .output()
            .await
            .map_err(|e| map_spawn_err(e, "yt-dlp"))?;

        if !output.status.success() {
            return Err(classify_probe_failure(&String::from_utf8_lossy(&output.stderr)));
        }
        let direct_url = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if direct_url.is_empty() {
            return Err(YtCoreError::SourceUnavailable("no direct url resolved".to_string()));
        }
        Ok((direct_url, probe.title))
    }

    #[instrument(skip(self, output_template, extra_args, stop_signal, progress_tx))]
    async fn download_with_progress(
        &self,
        url: &str,
        video_id: &str,
        output_template: &Path,
        is_live: bool,
        extra_args: &[String],
        stop_signal: StopSignal,
        progress_tx: Sender<DownloadProgressEvent>,
    ) -> Result<PathBuf> {
        let mut args: Vec<String> = vec![
            "--no-warnings".to_string(),
            "--newline".to_string(),
            "--output".to_string(),
            output_template.to_string_lossy().to_string(),
        ];
        if is_live {
            args.push("--live-from-start".to_string());
        }
        args.extend(extra_args.iter().cloned());
        args.push(url.to_string());

        let mut child = Command::new("yt-dlp")
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| map_spawn_err(e, "yt-dlp"))?;

        let stdout = child.stdout.take().expect("piped stdout");
        let mut reader = BufReader::new(stdout).lines();

        let percent_re = Regex::new(r"\[download\]\s+([\d.]+)%").expect("valid regex");
        let eta_re = Regex::new(r"ETA\s+([\d:]+)").expect("valid regex");
        let speed_re = Regex::new(r"at\s+([\d.]+\S*/s)").expect("valid regex");

        let mut became_private = false;
        let mut antibot_blocked = false;
        let mut final_path: Option<PathBuf> = None;

        loop {
            tokio::select! {
                line = reader.next_line() => {
                    let Some(line) = line.map_err(YtCoreError::Io)? else { break };
                    let lower = line.to_lowercase();
                    if lower.contains("private") && lower.contains("unavailable") {
                        became_private = true;
                    }
                    if lower.contains("sign in to confirm") || lower.contains("not a bot") {
                        antibot_blocked = true;
                    }
                    if let Some(path) = line.strip_prefix("after_move:") {
                        final_path = Some(PathBuf::from(path.trim()));
                    }

                    let percent = percent_re
                        .captures(&line)
                        .and_then(|c| c.get(1))
                        .and_then(|m| m.as_str().parse::<f64>().ok());
                    let eta = eta_re.captures(&line).and_then(|c| c.get(1)).map(|m| m.as_str().to_string());
                    let speed = speed_re.captures(&line).and_then(|c| c.get(1)).map(|m| m.as_str().to_string());

                    let live_stats = if is_live {
                        sample_part_file(output_template, video_id)
                    } else {
                        None
                    };

                    let _ = progress_tx
                        .send(DownloadProgressEvent { percent, speed, eta, line, live_stats })
                        .await;
                }
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    if stop_signal.is_stopped() {
                        let _ = child.start_kill();
                        return Err(YtCoreError::LiveStopRequested);
                    }
                }
            }
        }

        let status = child.wait().await.map_err(|e| YtCoreError::ToolFailed(e.to_string()))?;

        if became_private {
            return Err(YtCoreError::LiveBecamePrivate);
        }
        if !status.success() {
            if antibot_blocked {
                return Err(YtCoreError::SourceUnavailable(
                    "Download blocked by anti-bot protection.".to_string(),
                ));
            }
            return Err(YtCoreError::ToolFailed(format!("yt-dlp exited with {status}")));
        }

        final_path
            .or_else(|| find_downloaded_file(output_template))
            .ok_or_else(|| YtCoreError::ToolFailed("yt-dlp produced no output file".to_string()))
    }
}

fn find_vtt_file(dir: &Path, video_id: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .map(|e| e.path())
        .find(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.starts_with(video_id))
                .unwrap_or(false)
                && p.extension().and_then(|e| e.to_str()) == Some("vtt")
        })
}

fn find_downloaded_file(output_template: &Path) -> Option<PathBuf> {
    let dir = output_template.parent()?;
    let stem = output_template.file_stem()?.to_str()?.to_string();
    let prefix = stem.split("%(").next().unwrap_or(&stem).to_string();
    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false)
        })
}

/// Sample the live part-file's size/mtime for stuck detection (spec.md §4.7:
/// both size-growth and mtime-recency are required to indicate liveness).
fn sample_part_file(output_template: &Path, video_id: &str) -> Option<LiveStats> {
    let dir = output_template.parent()?;
    let entry = std::fs::read_dir(dir).ok()?.flatten().find(|e| {
        e.file_name()
            .to_str()
            .map(|n| n.starts_with(video_id) && n.ends_with(".part"))
            .unwrap_or(false)
    })?;
    let meta = entry.metadata().ok()?;
    let modified: chrono::DateTime<chrono::Utc> = meta.modified().ok()?.into();
    Some(LiveStats { output_bytes: meta.len(), output_mtime: modified })
}

/// Parse WebVTT cue blocks into `[start, end, text]` segments.
fn parse_vtt(vtt: &str) -> Vec<CaptionSegment> {
    let cue_re = Regex::new(
        r"(\d{2}:\d{2}:\d{2}\.\d{3}|\d{2}:\d{2}\.\d{3})\s*-->\s*(\d{2}:\d{2}:\d{2}\.\d{3}|\d{2}:\d{2}\.\d{3})",
    )
    .expect("valid regex");

    let mut segments = Vec::new();
    let mut lines = vtt.lines().peekable();
    while let Some(line) = lines.next() {
        if let Some(caps) = cue_re.captures(line) {
            let start = parse_vtt_timestamp(&caps[1]);
            let end = parse_vtt_timestamp(&caps[2]);
            let mut text_lines = Vec::new();
            while let Some(next) = lines.peek() {
                if next.trim().is_empty() || cue_re.is_match(next) {
                    break;
                }
                text_lines.push(strip_vtt_tags(lines.next().unwrap()));
            }
            let text = text_lines.join(" ").trim().to_string();
            if !text.is_empty() {
                segments.push(CaptionSegment { start, end, text });
            }
        }
    }
    dedupe_consecutive(segments)
}

fn strip_vtt_tags(line: &str) -> String {
    let tag_re = Regex::new(r"<[^>]*>").expect("valid regex");
    tag_re.replace_all(line, "").trim().to_string()
}

fn parse_vtt_timestamp(ts: &str) -> f64 {
    let parts: Vec<&str> = ts.split(':').collect();
    let (h, m, s): (f64, f64, f64) = match parts.as_slice() {
        [h, m, s] => (h.parse().unwrap_or(0.0), m.parse().unwrap_or(0.0), s.parse().unwrap_or(0.0)),
        [m, s] => (0.0, m.parse().unwrap_or(0.0), s.parse().unwrap_or(0.0)),
        _ => (0.0, 0.0, 0.0),
    };
    h * 3600.0 + m * 60.0 + s
}

/// yt-dlp's auto-captions repeat overlapping rolling-caption text; collapse
/// consecutive duplicate/sub-string lines to approximate final captions.
fn dedupe_consecutive(segments: Vec<CaptionSegment>) -> Vec<CaptionSegment> {
    let mut out: Vec<CaptionSegment> = Vec::with_capacity(segments.len());
    for seg in segments {
        if let Some(prev) = out.last() {
            if prev.text == seg.text {
                continue;
            }
        }
        out.push(seg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vtt_timestamp_parses_both_formats() {
        assert_eq!(parse_vtt_timestamp("00:01:05.000"), 65.0);
        assert_eq!(parse_vtt_timestamp("01:05.000"), 65.0);
    }

    #[test]
    fn vtt_parsing_extracts_segments_and_strips_tags() {
        let vtt = "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\n<c>Hello</c> world\n\n00:00:02.000 --> 00:00:04.000\nSecond line\n";
        let segments = parse_vtt(vtt);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello world");
        assert_eq!(segments[1].start, 2.0);
    }

    #[test]
    fn classify_probe_failure_maps_private() {
        let err = classify_probe_failure("ERROR: Video unavailable. This video is private");
        assert!(matches!(err, YtCoreError::SourceUnavailable(_)));
    }
}
