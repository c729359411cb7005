//! Live Recording Supervisor (C7): probes a URL, waits out an upcoming
//! stream, records a live broadcast under cooperative cancellation, and
//! optionally retries a full-replay download afterward (spec.md §4.7).
//!
//! Grounded on `original_source/live_flow.py`'s `run_download_flow`/
//! `wait_for_upcoming_to_start` for the state machine and
//! `original_source/replay_flow.py`'s `schedule_full_replay_attempt` for the
//! background retry task — the teacher has no live-recording analog, so the
//! HOW here (tokio task + `StopSignal`, `Mutex`-guarded runtime tables) is
//! adapted from the teacher's `Mutex<Connection>` state-guarding idiom and
//! spec.md §5's cooperative-cancellation design note.

use crate::error::{YtCoreError, Result};
use crate::media::{DownloadProgressEvent, LiveStatus, MediaSource, StopSignal};
use crate::store::{classify_service_by_start, ArchiveRecord, ArchiveStatus, ServiceKey, StateStore};
use chrono::{DateTime, Local, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Fan-out events for a live recording's lifecycle, consumed by the job
/// registry / WebSocket surface (C9/C10).
#[derive(Debug, Clone)]
pub enum LiveEvent {
    Started { video_id: String, title: String, service_key: Option<ServiceKey> },
    Progress(DownloadProgressEvent),
    Stopped { video_id: String, partial_path: Option<PathBuf> },
    Partial { video_id: String, partial_path: Option<PathBuf> },
    Saved { video_id: String, path: PathBuf },
    Failed { video_id: String, reason: String },
    FullReplaySaved { video_id: String, path: PathBuf },
    WaitingForUpcoming { video_id: String, remaining_secs: u64 },
}

#[derive(Debug, Clone)]
pub enum LiveOutcome {
    Saved { path: PathBuf },
    Partial { path: Option<PathBuf> },
    Stopped { path: Option<PathBuf> },
    Failed { reason: String },
    AlreadyRecording,
    TimedOutWaitingForUpcoming,
}

struct ActiveLiveInfo {
    title: String,
    started_at: Instant,
    stop_signal: StopSignal,
}

#[derive(Debug, Clone)]
pub struct ActiveLiveSummary {
    pub video_id: String,
    pub title: String,
    pub started_minutes_ago: u64,
}

#[derive(Default)]
struct Runtime {
    active: Mutex<HashMap<String, ActiveLiveInfo>>,
    replay_tasks: Arc<Mutex<HashSet<String>>>,
}

pub struct LiveSupervisor {
    store: Arc<StateStore>,
    media: Arc<dyn MediaSource>,
    settings: crate::config::LiveSettings,
    storage_dir: PathBuf,
    runtime: Runtime,
    events: broadcast::Sender<LiveEvent>,
}

impl LiveSupervisor {
    pub fn new(
        store: Arc<StateStore>,
        media: Arc<dyn MediaSource>,
        settings: crate::config::LiveSettings,
        storage_dir: PathBuf,
    ) -> Self {
        let (events, _rx) = broadcast::channel(256);
        Self { store, media, settings, storage_dir, runtime: Runtime::default(), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: LiveEvent) {
        let _ = self.events.send(event);
    }

    pub fn active_snapshot(&self) -> Vec<ActiveLiveSummary> {
        let active = self.runtime.active.lock().unwrap_or_else(|e| e.into_inner());
        active
            .iter()
            .map(|(video_id, info)| ActiveLiveSummary {
                video_id: video_id.clone(),
                title: info.title.clone(),
                started_minutes_ago: info.started_at.elapsed().as_secs() / 60,
            })
            .collect()
    }

    /// Idempotent: repeated calls and calls for an unknown video id are both
    /// harmless no-ops that return whether a stop was actually requested.
    pub fn request_stop(&self, video_id: &str) -> bool {
        let active = self.runtime.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.get(video_id) {
            Some(info) => {
                info.stop_signal.request_stop();
                true
            }
            None => false,
        }
    }

    #[instrument(skip(self))]
    pub async fn start_recording(&self, url: &str, started_by_chat_id: i64) -> Result<LiveOutcome> {
        let mut probe = self.media.probe(url).await?;

        if matches!(probe.live_status, LiveStatus::Upcoming) {
            match self.wait_for_upcoming(url, &probe.id, &probe.title).await? {
                Some(updated) => probe = updated,
                None => return Ok(LiveOutcome::TimedOutWaitingForUpcoming),
            }
        }

        let is_live_now = matches!(probe.live_status, LiveStatus::Live);
        let archived_live_mode = matches!(probe.live_status, LiveStatus::WasLive);

        if is_live_now {
            let active = self.runtime.active.lock().unwrap_or_else(|e| e.into_inner());
            if active.contains_key(&probe.id) {
                return Ok(LiveOutcome::AlreadyRecording);
            }
        }

        let started_utc = Utc::now();
        let started_local = started_utc.with_timezone(&Local);
        let (date_key, service_key) = (
            started_local.format("%Y-%m-%d").to_string(),
            classify_service_by_start(started_local.hour_local(), self.settings.session_split_hour),
        );

        let stop_signal = StopSignal::new();
        if is_live_now {
            self.runtime.active.lock().unwrap_or_else(|e| e.into_inner()).insert(
                probe.id.clone(),
                ActiveLiveInfo { title: probe.title.clone(), started_at: Instant::now(), stop_signal: stop_signal.clone() },
            );
        }

        let mut record = self
            .store
            .get_record(&probe.id)?
            .unwrap_or_else(|| ArchiveRecord::new(probe.id.clone(), probe.title.clone(), url.to_string()));
        record.title = probe.title.clone();
        record.channel = probe.channel.clone();
        record.started_utc = Some(started_utc);
        record.started_local = Some(started_local.to_rfc3339());
        record.date_key = Some(date_key.clone());
        record.service_key = Some(service_key);
        record.status = ArchiveStatus::Recording;
        self.store.upsert_record(record)?;

        self.publish(LiveEvent::Started {
            video_id: probe.id.clone(),
            title: probe.title.clone(),
            service_key: Some(service_key),
        });

        let safe_title = sanitize_filename(&probe.title);
        let output_template = self.storage_dir.join(format!("{safe_title} [{}].%(ext)s", probe.id));
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let events_clone = self.events.clone();
        let forward = tokio::spawn(async move {
            while let Some(evt) = rx.recv().await {
                let _ = events_clone.send(LiveEvent::Progress(evt));
            }
        });

        let extra_args = Vec::new();
        let result = self
            .media
            .download_with_progress(url, &probe.id, &output_template, is_live_now, &extra_args, stop_signal, tx)
            .await;
        forward.abort();

        let outcome = match result {
            Ok(path) => {
                self.finalize_terminal(&probe.id, is_live_now, |record| mark_saved(record, &path))?;
                self.publish(LiveEvent::Saved { video_id: probe.id.clone(), path: path.clone() });
                if is_live_now && !archived_live_mode && self.settings.enable_full_replay_retry {
                    self.schedule_full_replay_retry(url.to_string(), probe.id.clone(), probe.title.clone());
                }
                LiveOutcome::Saved { path }
            }
            Err(YtCoreError::LiveStopRequested) => {
                let part = self.find_newest_part(&probe.id);
                self.finalize_terminal(&probe.id, is_live_now, |record| mark_stopped(record, part.as_deref()))?;
                self.publish(LiveEvent::Stopped { video_id: probe.id.clone(), partial_path: part.clone() });
                LiveOutcome::Stopped { path: part }
            }
            Err(YtCoreError::LiveStuckTimeout) | Err(YtCoreError::LiveBecamePrivate) => {
                let part = self.find_newest_part(&probe.id);
                self.finalize_terminal(&probe.id, is_live_now, |record| mark_partial(record, part.as_deref()))?;
                self.publish(LiveEvent::Partial { video_id: probe.id.clone(), partial_path: part.clone() });
                if is_live_now && !archived_live_mode && self.settings.enable_full_replay_retry {
                    self.schedule_full_replay_retry(url.to_string(), probe.id.clone(), probe.title.clone());
                }
                LiveOutcome::Partial { path: part }
            }
            Err(e) => {
                warn!("live recording failed for {}: {e}", probe.id);
                self.finalize_terminal(&probe.id, is_live_now, mark_failed)?;
                self.publish(LiveEvent::Failed { video_id: probe.id.clone(), reason: e.to_string() });
                LiveOutcome::Failed { reason: e.to_string() }
            }
        };

        Ok(outcome)
    }

    /// Clears the `ActiveLives` entry and writes the terminal archive status
    /// under one critical section, so a concurrent `start_recording` for the
    /// same id never observes the entry gone while the record still reads
    /// `Recording` (spec.md §4.7).
    fn finalize_terminal(&self, video_id: &str, is_live_now: bool, update: impl FnOnce(&mut ArchiveRecord)) -> Result<()> {
        let mut active_guard = self.runtime.active.lock().unwrap_or_else(|e| e.into_inner());
        if is_live_now {
            active_guard.remove(video_id);
        }

        let result = (|| -> Result<()> {
            if let Some(mut record) = self.store.get_record(video_id)? {
                update(&mut record);
                self.store.upsert_record(record)?;
            }
            Ok(())
        })();

        drop(active_guard);
        result
    }

    async fn wait_for_upcoming(&self, url: &str, video_id: &str, title: &str) -> Result<Option<crate::media::ProbeResult>> {
        let deadline = Instant::now() + Duration::from_secs(self.settings.upcoming_wait_sec);
        info!("waiting for upcoming stream '{title}' to start");
        self.report_upcoming_wait(video_id, deadline);
        let mut last_report = Instant::now();

        while Instant::now() < deadline {
            sleep(Duration::from_secs(self.settings.upcoming_poll_sec)).await;
            match self.media.probe(url).await {
                Ok(p) if !matches!(p.live_status, LiveStatus::Upcoming) => return Ok(Some(p)),
                Ok(_) => {}
                Err(e) => warn!("probe while waiting for upcoming failed: {e}"),
            }
            if last_report.elapsed() >= Duration::from_secs(10) {
                last_report = Instant::now();
                self.report_upcoming_wait(video_id, deadline);
            }
        }
        Ok(None)
    }

    /// Publishes remaining wait time, called at most every 10s (spec.md §4.7).
    fn report_upcoming_wait(&self, video_id: &str, deadline: Instant) {
        let remaining_secs = deadline.saturating_duration_since(Instant::now()).as_secs();
        self.publish(LiveEvent::WaitingForUpcoming { video_id: video_id.to_string(), remaining_secs });
    }

    fn schedule_full_replay_retry(&self, url: String, video_id: String, title: String) {
        {
            let mut tasks = self.runtime.replay_tasks.lock().unwrap_or_else(|e| e.into_inner());
            if tasks.contains(&video_id) {
                return;
            }
            tasks.insert(video_id.clone());
        }

        let store = self.store.clone();
        let media = self.media.clone();
        let storage_dir = self.storage_dir.clone();
        let events = self.events.clone();
        let retry_minutes = self.settings.full_replay_retry_minutes;
        let retry_interval = self.settings.full_replay_retry_interval_sec;
        let replay_tasks = self.runtime.replay_tasks.clone();
        let task_video_id = video_id.clone();

        tokio::spawn(async move {
            sleep(Duration::from_secs(10)).await;
            let deadline = Instant::now() + Duration::from_secs(retry_minutes * 60);

            while Instant::now() < deadline {
                match media.probe(&url).await {
                    Ok(probe) if !matches!(probe.live_status, LiveStatus::Live | LiveStatus::Upcoming) => {
                        let safe_title = sanitize_filename(&title);
                        let output = storage_dir.join(format!("{safe_title} [FULL {video_id}].%(ext)s"));
                        let stop_signal = StopSignal::new();
                        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
                        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
                        let result = media
                            .download_with_progress(&url, &video_id, &output, false, &[], stop_signal, tx)
                            .await;
                        drain.abort();

                        match result {
                            Ok(path) => {
                                if let Ok(Some(mut record)) = store.get_record(&video_id) {
                                    record.full_filename = path.file_name().map(|f| f.to_string_lossy().to_string());
                                    let _ = store.upsert_record(record);
                                }
                                let _ = events.send(LiveEvent::FullReplaySaved { video_id: video_id.clone(), path });
                                break;
                            }
                            Err(_) => {
                                sleep(Duration::from_secs(retry_interval)).await;
                                continue;
                            }
                        }
                    }
                    _ => {
                        sleep(Duration::from_secs(retry_interval)).await;
                        continue;
                    }
                }
            }

            replay_tasks.lock().unwrap_or_else(|e| e.into_inner()).remove(&task_video_id);
        });
    }

    /// Newest `*video_id*.part` (or partially-downloaded) file in the
    /// storage dir, if any survives a stopped/stuck recording.
    fn find_newest_part(&self, video_id: &str) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.storage_dir).ok()?;
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|f| f.to_str())
                    .map(|name| name.contains(video_id))
                    .unwrap_or(false)
            })
            .max_by_key(|p| std::fs::metadata(p).and_then(|m| m.modified()).ok())
    }
}

fn mark_saved(record: &mut ArchiveRecord, path: &Path) {
    record.status = ArchiveStatus::Saved;
    record.filename = path.file_name().map(|f| f.to_string_lossy().to_string());
}

fn mark_stopped(record: &mut ArchiveRecord, part: Option<&Path>) {
    record.status = ArchiveStatus::Stopped;
    if let Some(p) = part {
        record.filename = p.file_name().map(|f| f.to_string_lossy().to_string());
    }
}

fn mark_partial(record: &mut ArchiveRecord, part: Option<&Path>) {
    record.status = ArchiveStatus::Partial;
    if let Some(p) = part {
        record.filename = p.file_name().map(|f| f.to_string_lossy().to_string());
    }
}

fn mark_failed(record: &mut ArchiveRecord) {
    record.status = ArchiveStatus::Failed;
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' { c } else { '_' })
        .collect::<String>()
        .trim()
        .chars()
        .take(120)
        .collect()
}

trait HourLocal {
    fn hour_local(&self) -> u32;
}

impl HourLocal for DateTime<Local> {
    fn hour_local(&self) -> u32 {
        use chrono::Timelike;
        self.hour()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_filename_replaces_unsafe_chars() {
        assert_eq!(sanitize_filename("a/b:c*d"), "a_b_c_d");
    }

    #[test]
    fn sanitize_filename_truncates_long_titles() {
        let long = "x".repeat(500);
        assert!(sanitize_filename(&long).len() <= 120);
    }
}
