//! Job Registry & Event Bus (C9): in-memory job tables, snapshot
//! serialization, and fan-out to subscribers (spec.md §4.9).
//!
//! New relative to the teacher (no job/event concept exists today);
//! grounded in spec.md §4.9 and §9's design note ("broadcast channel keyed
//! by subscriber handle; publishers never block, slow subscribers are
//! evicted"). The three mutex-guarded tables mirror the teacher's
//! `Mutex<Connection>` single-resource-per-mutex idiom, one mutex per table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Fan-out event published on every job-table mutation (spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    #[serde(rename = "juice_job_created")]
    JuiceJobCreated { job: BrewJobSnapshot },
    #[serde(rename = "juice_job_update")]
    JuiceJobUpdate { job: BrewJobSnapshot },
    #[serde(rename = "component_job_created")]
    ComponentJobCreated { job: ComponentTestJobSnapshot },
    #[serde(rename = "component_job_update")]
    ComponentJobUpdate { job: ComponentTestJobSnapshot },
    #[serde(rename = "hello")]
    Hello { runtime: String, active_jobs: usize, active_component_jobs: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

/// A single progress tick, shared shape for Knowledge Juice steps
/// (spec.md §4.8) and component-test/analyze/ask progress (§4.9/§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressPoint {
    pub step: u32,
    pub total_steps: u32,
    pub ratio: f64,
}

impl ProgressPoint {
    pub fn new(step: u32, total_steps: u32) -> Self {
        let ratio = if total_steps == 0 { 0.0 } else { (step as f64 / total_steps as f64).clamp(0.0, 1.0) };
        Self { step, total_steps, ratio }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateVideo {
    pub video_id: String,
    pub url: String,
    pub title: String,
    pub channel: String,
    pub popularity_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewedVideo {
    pub video_id: String,
    pub title: String,
    pub is_owner_story: Option<bool>,
    pub confidence: f64,
}

/// Observable snapshot of a Knowledge Juice run (a "brew job").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrewJobSnapshot {
    pub job_id: String,
    pub chat_id: i64,
    pub topic: String,
    pub is_public: bool,
    pub status: JobStatus,
    pub event_type: String,
    pub detail: String,
    pub progress: ProgressPoint,
    pub llm_backend: Option<String>,
    pub candidate_videos: Vec<CandidateVideo>,
    pub reviewed: Vec<ReviewedVideo>,
    pub run_id: Option<String>,
    pub report_text: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Web,
    Tg,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseRow {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Observable snapshot of a `component_tests` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentTestJobSnapshot {
    pub job_id: String,
    pub component: ComponentKind,
    pub status: JobStatus,
    pub log_tail: Vec<String>,
    pub cases: Vec<TestCaseRow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Observable snapshot of an in-flight `analyze`/`ask` task (spec.md §4.9
/// NotesProgress table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesProgressSnapshot {
    pub video_id: String,
    pub kind: NotesKind,
    pub status: JobStatus,
    pub detail: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotesKind {
    Analyze,
    Ask,
}

struct BrewTable {
    jobs: HashMap<String, BrewJobSnapshot>,
}

struct ComponentTable {
    jobs: HashMap<String, ComponentTestJobSnapshot>,
}

struct NotesTable {
    in_flight: HashSet<(String, NotesKind)>,
    progress: HashMap<(String, NotesKind), NotesProgressSnapshot>,
}

/// Runtime registry for C8/C10-observable jobs, with a broadcast event bus
/// fed by every mutating call (spec.md §4.9).
///
/// Each table is guarded by its own mutex so unrelated job kinds never
/// contend on the same lock (spec.md §4.9: "Each table is guarded by its
/// own mutex").
pub struct JobRegistry {
    brew: Mutex<BrewTable>,
    component: Mutex<ComponentTable>,
    notes: Mutex<NotesTable>,
    events: broadcast::Sender<JobEvent>,
    max_candidate_videos: usize,
    max_reviewed: usize,
    max_log_lines: usize,
    max_test_case_rows: usize,
}

impl JobRegistry {
    pub fn new(settings: &crate::config::JobsSettings) -> Self {
        let (events, _rx) = broadcast::channel(settings.broadcast_capacity.max(16));
        Self {
            brew: Mutex::new(BrewTable { jobs: HashMap::new() }),
            component: Mutex::new(ComponentTable { jobs: HashMap::new() }),
            notes: Mutex::new(NotesTable { in_flight: HashSet::new(), progress: HashMap::new() }),
            events,
            max_candidate_videos: settings.max_candidate_videos,
            max_reviewed: settings.max_reviewed,
            max_log_lines: settings.max_log_lines,
            max_test_case_rows: settings.max_test_case_rows,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Greeting sent to a newly-connected subscriber (spec.md §4.9).
    pub fn greeting(&self) -> JobEvent {
        let active_jobs = self.brew.lock().unwrap_or_else(|e| e.into_inner()).jobs.values()
            .filter(|j| j.status == JobStatus::Running)
            .count();
        let active_component_jobs = self.component.lock().unwrap_or_else(|e| e.into_inner()).jobs.values()
            .filter(|j| j.status == JobStatus::Running)
            .count();
        JobEvent::Hello { runtime: "ytcore".to_string(), active_jobs, active_component_jobs }
    }

    fn publish(&self, event: JobEvent) {
        let _ = self.events.send(event);
    }

    // === Brew jobs (Knowledge Juice) ===

    pub fn create_brew_job(&self, chat_id: i64, topic: &str, is_public: bool) -> BrewJobSnapshot {
        let now = Utc::now();
        let snapshot = BrewJobSnapshot {
            job_id: Uuid::new_v4().simple().to_string(),
            chat_id,
            topic: topic.to_string(),
            is_public,
            status: JobStatus::Running,
            event_type: "started".to_string(),
            detail: "starting".to_string(),
            progress: ProgressPoint::new(0, 5),
            llm_backend: None,
            candidate_videos: Vec::new(),
            reviewed: Vec::new(),
            run_id: None,
            report_text: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.brew.lock().unwrap_or_else(|e| e.into_inner()).jobs.insert(snapshot.job_id.clone(), snapshot.clone());
        self.publish(JobEvent::JuiceJobCreated { job: snapshot.clone() });
        snapshot
    }

    /// Mutate a brew job's snapshot via `f`, bound candidate/reviewed lists,
    /// persist, and publish the update. No-op if the job id is unknown.
    pub fn update_brew_job(&self, job_id: &str, f: impl FnOnce(&mut BrewJobSnapshot)) -> Option<BrewJobSnapshot> {
        let mut table = self.brew.lock().unwrap_or_else(|e| e.into_inner());
        let job = table.jobs.get_mut(job_id)?;
        f(job);
        job.updated_at = Utc::now();
        if job.candidate_videos.len() > self.max_candidate_videos {
            let overflow = job.candidate_videos.len() - self.max_candidate_videos;
            job.candidate_videos.drain(0..overflow);
        }
        if job.reviewed.len() > self.max_reviewed {
            let overflow = job.reviewed.len() - self.max_reviewed;
            job.reviewed.drain(0..overflow);
        }
        let snapshot = job.clone();
        drop(table);
        self.publish(JobEvent::JuiceJobUpdate { job: snapshot.clone() });
        Some(snapshot)
    }

    pub fn get_brew_job(&self, job_id: &str) -> Option<BrewJobSnapshot> {
        self.brew.lock().unwrap_or_else(|e| e.into_inner()).jobs.get(job_id).cloned()
    }

    pub fn list_brew_jobs(&self, active_only: bool) -> Vec<BrewJobSnapshot> {
        let table = self.brew.lock().unwrap_or_else(|e| e.into_inner());
        let mut jobs: Vec<BrewJobSnapshot> = table
            .jobs
            .values()
            .filter(|j| !active_only || j.status == JobStatus::Running)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    // === Component test jobs ===

    pub fn create_component_job(&self, component: ComponentKind) -> ComponentTestJobSnapshot {
        let now = Utc::now();
        let snapshot = ComponentTestJobSnapshot {
            job_id: Uuid::new_v4().simple().to_string(),
            component,
            status: JobStatus::Running,
            log_tail: Vec::new(),
            cases: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.component.lock().unwrap_or_else(|e| e.into_inner()).jobs.insert(snapshot.job_id.clone(), snapshot.clone());
        self.publish(JobEvent::ComponentJobCreated { job: snapshot.clone() });
        snapshot
    }

    pub fn update_component_job(
        &self,
        job_id: &str,
        f: impl FnOnce(&mut ComponentTestJobSnapshot),
    ) -> Option<ComponentTestJobSnapshot> {
        let mut table = self.component.lock().unwrap_or_else(|e| e.into_inner());
        let job = table.jobs.get_mut(job_id)?;
        f(job);
        job.updated_at = Utc::now();
        if job.log_tail.len() > self.max_log_lines {
            let overflow = job.log_tail.len() - self.max_log_lines;
            job.log_tail.drain(0..overflow);
        }
        if job.cases.len() > self.max_test_case_rows {
            let overflow = job.cases.len() - self.max_test_case_rows;
            job.cases.drain(0..overflow);
        }
        let snapshot = job.clone();
        drop(table);
        self.publish(JobEvent::ComponentJobUpdate { job: snapshot.clone() });
        Some(snapshot)
    }

    pub fn get_component_job(&self, job_id: &str) -> Option<ComponentTestJobSnapshot> {
        self.component.lock().unwrap_or_else(|e| e.into_inner()).jobs.get(job_id).cloned()
    }

    pub fn list_component_jobs(&self) -> Vec<ComponentTestJobSnapshot> {
        let table = self.component.lock().unwrap_or_else(|e| e.into_inner());
        let mut jobs: Vec<ComponentTestJobSnapshot> = table.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    // === Notes (analyze/ask) single-flight + progress ===

    /// Atomically claim `(video_id, kind)`; returns `false` if already
    /// running (spec.md §4.9 single-flight on notes tasks). The caller MUST
    /// release the key via `finish_notes_task` in a `finally`-equivalent.
    pub fn try_start_notes_task(&self, video_id: &str, kind: NotesKind) -> bool {
        let mut table = self.notes.lock().unwrap_or_else(|e| e.into_inner());
        let key = (video_id.to_string(), kind);
        if table.in_flight.contains(&key) {
            return false;
        }
        table.in_flight.insert(key.clone());
        let now = Utc::now();
        table.progress.insert(
            key,
            NotesProgressSnapshot {
                video_id: video_id.to_string(),
                kind,
                status: JobStatus::Running,
                detail: "starting".to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        true
    }

    pub fn update_notes_progress(&self, video_id: &str, kind: NotesKind, detail: &str) {
        let mut table = self.notes.lock().unwrap_or_else(|e| e.into_inner());
        let key = (video_id.to_string(), kind);
        if let Some(entry) = table.progress.get_mut(&key) {
            entry.detail = detail.to_string();
            entry.updated_at = Utc::now();
        }
    }

    /// Release the single-flight key and record a terminal status. MUST be
    /// called exactly once per successful `try_start_notes_task`.
    pub fn finish_notes_task(&self, video_id: &str, kind: NotesKind, status: JobStatus) {
        let mut table = self.notes.lock().unwrap_or_else(|e| e.into_inner());
        let key = (video_id.to_string(), kind);
        table.in_flight.remove(&key);
        if let Some(entry) = table.progress.get_mut(&key) {
            entry.status = status;
            entry.updated_at = Utc::now();
        }
    }

    pub fn get_notes_progress(&self, video_id: &str, kind: NotesKind) -> Option<NotesProgressSnapshot> {
        self.notes.lock().unwrap_or_else(|e| e.into_inner()).progress.get(&(video_id.to_string(), kind)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> JobRegistry {
        JobRegistry::new(&crate::config::JobsSettings::default())
    }

    #[test]
    fn brew_job_lifecycle_ends_terminal_with_full_ratio() {
        let reg = registry();
        let job = reg.create_brew_job(1, "bakery", true);
        reg.update_brew_job(&job.job_id, |j| {
            j.status = JobStatus::Completed;
            j.progress = ProgressPoint::new(5, 5);
            j.run_id = Some("r1".to_string());
        });
        let final_job = reg.get_brew_job(&job.job_id).unwrap();
        assert_eq!(final_job.status, JobStatus::Completed);
        assert!((final_job.progress.ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn failed_job_carries_nonempty_error() {
        let reg = registry();
        let job = reg.create_brew_job(1, "bakery", true);
        reg.update_brew_job(&job.job_id, |j| {
            j.status = JobStatus::Failed;
            j.error = Some("boom".to_string());
        });
        let final_job = reg.get_brew_job(&job.job_id).unwrap();
        assert_eq!(final_job.status, JobStatus::Failed);
        assert!(!final_job.error.unwrap_or_default().is_empty());
    }

    #[test]
    fn notes_single_flight_rejects_concurrent_start() {
        let reg = registry();
        assert!(reg.try_start_notes_task("v1", NotesKind::Ask));
        assert!(!reg.try_start_notes_task("v1", NotesKind::Ask));
        reg.finish_notes_task("v1", NotesKind::Ask, JobStatus::Completed);
        assert!(reg.try_start_notes_task("v1", NotesKind::Ask));
    }

    #[test]
    fn candidate_videos_bounded_to_configured_max() {
        let reg = registry();
        let job = reg.create_brew_job(1, "t", true);
        reg.update_brew_job(&job.job_id, |j| {
            j.candidate_videos = (0..100)
                .map(|i| CandidateVideo {
                    video_id: format!("v{i}"),
                    url: String::new(),
                    title: String::new(),
                    channel: String::new(),
                    popularity_score: 0.0,
                })
                .collect();
        });
        let final_job = reg.get_brew_job(&job.job_id).unwrap();
        assert_eq!(final_job.candidate_videos.len(), 24);
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let reg = registry();
        let mut rx = reg.subscribe();
        let job = reg.create_brew_job(1, "t", true);
        reg.update_brew_job(&job.job_id, |j| j.detail = "step1".to_string());
        reg.update_brew_job(&job.job_id, |j| j.detail = "step2".to_string());

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, JobEvent::JuiceJobCreated { .. }));
        let second = rx.recv().await.unwrap();
        match second {
            JobEvent::JuiceJobUpdate { job } => assert_eq!(job.detail, "step1"),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
