//! Knowledge Juice Orchestrator (C8): a 5-step research pipeline (intent →
//! queries → candidate search → per-video transcript+fact extraction →
//! cross-video synthesis) exposed synchronously or as a background job
//! (spec.md §4.8).
//!
//! New relative to the teacher; grounded in `original_source/market_research.py`'s
//! `run_market_research` (pipeline shape and progress events) and
//! `state_store/research.py` (persistence calls). Per-video transcript
//! extraction reuses C3's `TranscriptBuilder`; fact/topic/comparison calls
//! follow `qa::QaEngine`'s JSON-contract-over-`ChatChain` convention.

use crate::config::ResearchSettings;
use crate::error::{YtCoreError, Result};
use crate::jobs::{JobRegistry, JobStatus, ProgressPoint};
use crate::providers::ChatChain;
use crate::search::{popularity_score, SearchResult, VideoSearch};
use crate::store::{ResearchIntent, ResearchRunKind, ResearchSummary, ResearchVideo, ResearchVideoFact, RunStatus, StateStore};
use crate::transcript::TranscriptBuilder;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Final, caller-facing outcome of a research run, returned both for
/// synchronous calls and (via the job snapshot) background ones.
#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub run_id: Option<String>,
    pub report_text: String,
    pub summary: ResearchSummary,
    pub videos: Vec<ResearchVideo>,
}

/// Build the fixed Knowledge Juice goal template for a free-text topic
/// (spec.md §9 GLOSSARY "Knowledge Juice"), grounded on
/// `market_research.py::build_knowledge_juice_goal`.
pub fn build_knowledge_juice_goal(topic_text: &str) -> String {
    let topic = collapse_whitespace(topic_text.trim());
    if topic.is_empty() {
        return String::new();
    }
    format!(
        "I want to become successful in {topic}. Find popular YouTube videos where real owners/operators \
         explain how they started and grew. Save transcripts, compare similarities and differences, and \
         give practical next steps."
    )
}

fn collapse_whitespace(s: &str) -> String {
    Regex::new(r"\s+").expect("valid regex").replace_all(s.trim(), " ").to_string()
}

#[derive(Debug, Deserialize, Default)]
struct IntentReply {
    #[serde(default)]
    domain: String,
    #[serde(default)]
    objective: String,
    #[serde(default)]
    target_region: String,
    #[serde(default)]
    target_language: String,
    #[serde(default)]
    audience: String,
    #[serde(default)]
    success_signals: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct QueriesReply {
    #[serde(default)]
    queries: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct FactsReply {
    is_owner_story: Option<bool>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    business_model: String,
    #[serde(default)]
    growth_levers: Vec<String>,
    #[serde(default)]
    marketing_channels: Vec<String>,
    #[serde(default)]
    operations: Vec<String>,
    #[serde(default)]
    mistakes: Vec<String>,
    #[serde(default)]
    key_metrics: Vec<String>,
    #[serde(default)]
    differentiators: Vec<String>,
    #[serde(default)]
    evidence_quotes: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ComparisonReply {
    #[serde(default)]
    similarities: Vec<String>,
    #[serde(default)]
    differences: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TopicsReply {
    #[serde(default)]
    topics: Vec<TopicItem>,
}

#[derive(Debug, Deserialize)]
struct TopicItem {
    tag: String,
    #[serde(default)]
    weight: f64,
}

pub struct ResearchEngine {
    store: Arc<StateStore>,
    chat: Arc<ChatChain>,
    search: Arc<dyn VideoSearch>,
    transcripts: Arc<TranscriptBuilder>,
    chat_model: String,
    settings: ResearchSettings,
}

impl ResearchEngine {
    pub fn new(
        store: Arc<StateStore>,
        chat: Arc<ChatChain>,
        search: Arc<dyn VideoSearch>,
        transcripts: Arc<TranscriptBuilder>,
        chat_model: impl Into<String>,
        settings: ResearchSettings,
    ) -> Self {
        Self { store, chat, search, transcripts, chat_model: chat_model.into(), settings }
    }

    /// Run the full pipeline. When `job` is given, publishes a progress
    /// snapshot into the registry after each of the 5 steps (spec.md §4.8/§4.9);
    /// always returns the final report regardless.
    #[instrument(skip(self, job))]
    pub async fn run(
        &self,
        chat_id: i64,
        goal_text: &str,
        is_public: bool,
        run_kind: ResearchRunKind,
        job: Option<(&JobRegistry, &str)>,
    ) -> Result<ResearchReport> {
        let goal = collapse_whitespace(goal_text);
        if goal.is_empty() {
            return Err(YtCoreError::UserInput("research goal is empty".to_string()));
        }

        match self.run_inner(chat_id, &goal, is_public, run_kind, job).await {
            Ok(report) => {
                if let Some((registry, job_id)) = job {
                    registry.update_brew_job(job_id, |j| {
                        j.status = JobStatus::Completed;
                        j.event_type = "completed".to_string();
                        j.detail = format!("Completed with {} analyzed videos.", report.videos.len());
                        j.progress = ProgressPoint::new(5, 5);
                        j.run_id = report.run_id.clone();
                        j.report_text = Some(report.report_text.clone());
                    });
                }
                Ok(report)
            }
            Err(e) => {
                if let Some((registry, job_id)) = job {
                    registry.update_brew_job(job_id, |j| {
                        j.status = JobStatus::Failed;
                        j.event_type = "failed".to_string();
                        j.detail = e.to_string();
                        j.error = Some(e.to_string());
                        j.progress = ProgressPoint::new(5, 5);
                    });
                }
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        chat_id: i64,
        goal: &str,
        is_public: bool,
        run_kind: ResearchRunKind,
        job: Option<(&JobRegistry, &str)>,
    ) -> Result<ResearchReport> {
        // Step 1: intent parse.
        self.emit(job, 1, "started", "Understanding your goal and preparing settings.", None);
        let mut intent = self.parse_intent(goal).await;
        intent.run_kind = run_kind;

        let run_id = if is_public {
            Some(self.store.create_research_run(chat_id, goal, &intent, true)?)
        } else {
            None
        };

        // Step 2: query generation.
        self.emit(job, 2, "queries_ready", "Generating search queries.", None);
        let queries = self.generate_queries(goal, &intent).await;

        // Step 3: candidate collection.
        self.emit(job, 3, "candidates_ready", "Finding relevant YouTube videos.", None);
        let videos = self.collect_candidates(&queries).await;
        if videos.is_empty() {
            let msg = "No candidate videos found. Try a broader goal.".to_string();
            if let (Some(rid), true) = (&run_id, is_public) {
                let _ = self.store.finalize_research_run(
                    rid,
                    RunStatus::Failed,
                    &format!("Research failed: {msg}"),
                    &ResearchSummary::default(),
                );
            }
            return Err(YtCoreError::SourceUnavailable(msg));
        }
        if let Some(rid) = &run_id {
            self.store.save_research_videos(rid, &videos)?;
        }
        if let Some((registry, job_id)) = job {
            registry.update_brew_job(job_id, |j| {
                j.candidate_videos = videos
                    .iter()
                    .map(|v| crate::jobs::CandidateVideo {
                        video_id: v.video_id.clone(),
                        url: v.url.clone(),
                        title: v.title.clone(),
                        channel: v.channel.clone(),
                        popularity_score: v.popularity_score,
                    })
                    .collect();
            });
        }

        // Step 4: per-video processing.
        let mut facts_rows = Vec::new();
        let mut processed_videos = Vec::new();
        for (i, video) in videos.iter().enumerate() {
            self.emit(
                job,
                4,
                "processing_video",
                &format!("Video {}/{}: downloading transcript for {}", i + 1, videos.len(), video.title),
                None,
            );
            match self.process_video(goal, video, run_id.as_deref()).await {
                Ok((processed, fact)) => {
                    if let (Some(rid), true) = (&run_id, is_public) {
                        self.store.save_research_video_fact(rid, &video.video_id, &fact)?;
                    }
                    if let Some((registry, job_id)) = job {
                        registry.update_brew_job(job_id, |j| {
                            j.reviewed.push(crate::jobs::ReviewedVideo {
                                video_id: video.video_id.clone(),
                                title: processed.title.clone(),
                                is_owner_story: fact.is_owner_story,
                                confidence: fact.confidence,
                            });
                        });
                    }
                    self.emit(
                        job,
                        4,
                        "video_processed",
                        &format!("Video {}/{} analyzed ({}).", i + 1, videos.len(), processed.transcript_source),
                        None,
                    );
                    facts_rows.push(fact);
                    processed_videos.push(processed);
                }
                Err(e) => warn!("skipping video {}: {e}", video.video_id),
            }
        }

        // Step 5: comparison + topics.
        self.emit(job, 5, "comparing", "Comparing patterns across videos.", None);
        let saved_videos = match &run_id {
            Some(rid) if is_public => self.store.load_research_videos(rid)?,
            _ => processed_videos,
        };
        let saved_facts = match &run_id {
            Some(rid) if is_public => self.store.load_research_video_facts(rid)?,
            _ => facts_rows,
        };

        let topics = self.extract_topics(goal, &intent, &saved_facts).await;
        let related = if let Some(rid) = &run_id {
            let tags: Vec<String> = topics.iter().map(|(tag, _)| tag.clone()).collect();
            self.store.load_related_public_topics(&tags, rid, 10)?
        } else {
            Vec::new()
        };

        let (mut report_text, summary) = self.build_comparison_report(goal, &saved_videos, &saved_facts).await;
        if !related.is_empty() {
            report_text.push_str("\n\nRelated Areas You May Explore\n");
            for item in related.iter().take(8) {
                report_text.push_str(&format!("\n- {} (seen in {} public researches)", item.tag, item.run_count));
            }
        }
        match (&run_id, is_public) {
            (Some(rid), true) => {
                report_text.push_str(&format!("\n\nPublic research ID: {rid}"));
                self.store.save_research_topics(rid, &topics)?;
                self.store.finalize_research_run(rid, RunStatus::Completed, &report_text, &summary)?;
            }
            _ => report_text.push_str("\n\nPrivate mode: this research was not saved."),
        }

        Ok(ResearchReport {
            run_id: if is_public { run_id } else { None },
            report_text,
            summary,
            videos: saved_videos,
        })
    }

    fn emit(&self, job: Option<(&JobRegistry, &str)>, step: u32, event_type: &str, detail: &str, backend: Option<&str>) {
        if let Some((registry, job_id)) = job {
            registry.update_brew_job(job_id, |j| {
                j.event_type = event_type.to_string();
                j.detail = detail.to_string();
                j.progress = ProgressPoint::new(step, 5);
                if let Some(b) = backend {
                    j.llm_backend = Some(b.to_string());
                }
            });
        }
    }

    async fn parse_intent(&self, goal: &str) -> ResearchIntent {
        let system = "Extract structured research intent for a business-learning request. Return JSON with \
                      keys: domain, objective, target_region, target_language, audience, success_signals. \
                      success_signals must be a short list.";
        let user = format!("Request: {goal}");
        let reply: IntentReply = self
            .chat
            .complete(system, &user, &self.chat_model)
            .await
            .ok()
            .and_then(|(text, _)| extract_json(&text))
            .unwrap_or_default();

        ResearchIntent {
            domain: reply.domain,
            objective: if reply.objective.trim().is_empty() { goal.to_string() } else { reply.objective },
            target_region: reply.target_region,
            target_language: reply.target_language,
            audience: reply.audience,
            success_signals: reply.success_signals,
            run_kind: ResearchRunKind::default(),
        }
    }

    async fn generate_queries(&self, goal: &str, intent: &ResearchIntent) -> Vec<String> {
        let max_queries = self.settings.max_queries.max(3) as usize;
        let system = "Generate high-quality YouTube search queries for finding owner success stories and \
                      practical business lessons. Return JSON with key queries (list of strings). Keep \
                      queries diverse and concise.";
        let user = format!(
            "Goal: {goal}\nIntent: {}\nMax queries: {max_queries}",
            serde_json::to_string(intent).unwrap_or_default()
        );
        let reply: QueriesReply = self
            .chat
            .complete(system, &user, &self.chat_model)
            .await
            .ok()
            .and_then(|(text, _)| extract_json(&text))
            .unwrap_or_default();

        let mut queries: Vec<String> = reply.queries.into_iter().map(|q| q.trim().to_string()).filter(|q| !q.is_empty()).collect();
        if queries.is_empty() {
            queries = vec![
                format!("{goal} success story"),
                format!("{goal} owner interview"),
                format!("{goal} how I started"),
                format!("{goal} business case study"),
                format!("{goal} mistakes and lessons"),
                format!("{goal} from zero to profitable"),
            ];
        }

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for q in queries {
            let key = q.to_lowercase();
            if seen.insert(key) {
                out.push(q);
            }
            if out.len() >= max_queries {
                break;
            }
        }
        out
    }

    async fn collect_candidates(&self, queries: &[String]) -> Vec<ResearchVideo> {
        let per_query = 8u32;
        let max_videos = self.settings.max_videos.max(2) as usize;
        let no_caption_max_duration_sec = if self.settings.max_duration_sec > 0 {
            self.settings.no_caption_max_duration_sec.min(self.settings.max_duration_sec)
        } else {
            self.settings.no_caption_max_duration_sec
        };
        let now = Utc::now();

        let mut merged: HashMap<String, (SearchResult, f64)> = HashMap::new();
        for query in queries {
            let results = match self.search.search(query, per_query).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("search failed for query '{query}': {e}");
                    continue;
                }
            };
            for item in results {
                let dur = item.duration_sec;
                let too_short = self.settings.min_duration_sec > 0 && dur > 0 && dur < self.settings.min_duration_sec as i64;
                let too_long = no_caption_max_duration_sec > 0 && dur > 0 && dur > no_caption_max_duration_sec as i64;
                let needs_override = too_short || too_long;

                if self.settings.captions_only && !item.has_captions {
                    continue;
                }
                if needs_override && !item.has_captions {
                    continue;
                }

                let score = popularity_score(&item, now);
                let entry = merged.entry(item.video_id.clone()).or_insert_with(|| (item.clone(), score));
                if score > entry.1 {
                    *entry = (item, score);
                }
            }
        }

        let mut ranked: Vec<(SearchResult, f64)> = merged.into_values().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        ranked
            .into_iter()
            .take(max_videos)
            .enumerate()
            .map(|(i, (item, score))| ResearchVideo {
                run_id: String::new(),
                video_id: item.video_id,
                rank: i as i64 + 1,
                url: item.url,
                title: item.title,
                channel: item.channel,
                view_count: item.view_count,
                published_utc: item.published_utc,
                popularity_score: score,
                transcript_path: String::new(),
                transcript_source: String::new(),
                transcript_chars: 0,
                meta: item.meta,
            })
            .collect()
    }

    async fn process_video(
        &self,
        goal: &str,
        video: &ResearchVideo,
        run_id: Option<&str>,
    ) -> Result<(ResearchVideo, ResearchVideoFact)> {
        let build = self.transcripts.build_transcript(&video.video_id, &video.url, &video.title, None).await?;
        let transcript_text = std::fs::read_to_string(&build.transcript_path)?;

        let source_label = transcript_source_label(build.source);
        if let Some(rid) = run_id {
            self.store.save_research_video_transcript(
                rid,
                &video.video_id,
                &build.transcript_path.to_string_lossy(),
                source_label,
                transcript_text.len() as i64,
            )?;
        }

        let fact = self.extract_facts(goal, &build.title, &transcript_text).await;

        let mut processed = video.clone();
        processed.title = build.title;
        processed.transcript_path = build.transcript_path.to_string_lossy().to_string();
        processed.transcript_source = source_label.to_string();
        processed.transcript_chars = transcript_text.len() as i64;

        Ok((processed, fact))
    }

    async fn extract_facts(&self, goal: &str, title: &str, transcript_text: &str) -> ResearchVideoFact {
        let window: String = transcript_text.chars().take(22_000).collect();
        let system = "You extract business-learning facts from a transcript. Return JSON only with keys: \
                      is_owner_story, confidence, business_model, growth_levers, marketing_channels, \
                      operations, mistakes, key_metrics, differentiators, evidence_quotes. All list fields \
                      should contain short strings.";
        let user = format!("Research goal: {goal}\nVideo title: {title}\n\nTranscript:\n{window}");
        let reply: FactsReply = self
            .chat
            .complete(system, &user, &self.chat_model)
            .await
            .ok()
            .and_then(|(text, _)| extract_json(&text))
            .unwrap_or_default();

        ResearchVideoFact {
            run_id: String::new(),
            video_id: String::new(),
            is_owner_story: reply.is_owner_story,
            confidence: reply.confidence.clamp(0.0, 1.0),
            business_model: reply.business_model,
            facts: serde_json::json!({
                "growth_levers": reply.growth_levers,
                "marketing_channels": reply.marketing_channels,
                "operations": reply.operations,
                "mistakes": reply.mistakes,
                "key_metrics": reply.key_metrics,
                "differentiators": reply.differentiators,
                "evidence_quotes": reply.evidence_quotes,
            }),
        }
    }

    async fn build_comparison_report(
        &self,
        goal: &str,
        videos: &[ResearchVideo],
        facts_rows: &[ResearchVideoFact],
    ) -> (String, ResearchSummary) {
        let facts_by_vid: HashMap<&str, &ResearchVideoFact> =
            facts_rows.iter().map(|f| (f.video_id.as_str(), f)).collect();

        let owner_story_videos: Vec<&ResearchVideo> = videos
            .iter()
            .filter(|v| {
                facts_by_vid
                    .get(v.video_id.as_str())
                    .map(|f| f.is_owner_story == Some(true) && f.confidence >= self.settings.owner_confidence_min)
                    .unwrap_or(false)
            })
            .collect();

        let comparison_set: Vec<&ResearchVideo> = if owner_story_videos.len() >= 2 {
            owner_story_videos.clone()
        } else {
            videos.iter().collect()
        };

        let payload: Vec<serde_json::Value> = comparison_set
            .iter()
            .map(|v| {
                let fact = facts_by_vid.get(v.video_id.as_str());
                serde_json::json!({
                    "video_id": v.video_id,
                    "title": v.title,
                    "channel": v.channel,
                    "view_count": v.view_count,
                    "facts": fact.map(|f| f.facts.clone()).unwrap_or(serde_json::json!({})),
                    "is_owner_story": fact.and_then(|f| f.is_owner_story),
                    "confidence": fact.map(|f| f.confidence).unwrap_or(0.0),
                    "business_model": fact.map(|f| f.business_model.clone()).unwrap_or_default(),
                })
            })
            .collect();

        let system = "You compare multiple business success stories. Return JSON with keys: similarities, \
                      differences, recommendations. Each value should be a list of concise bullets.";
        let payload_text: String = serde_json::to_string(&payload).unwrap_or_default().chars().take(42_000).collect();
        let user = format!("Goal: {goal}\n\nAnalyzed videos and extracted facts:\n{payload_text}");
        let reply: ComparisonReply = self
            .chat
            .complete(system, &user, &self.chat_model)
            .await
            .ok()
            .and_then(|(text, _)| extract_json(&text))
            .unwrap_or_default();

        let mut lines = vec![
            "Business Research Report".to_string(),
            format!("Goal: {goal}"),
            format!("Videos analyzed: {}", videos.len()),
            format!("Owner-story matches: {}", owner_story_videos.len()),
            String::new(),
            "Top videos:".to_string(),
        ];
        for v in videos.iter().take(10) {
            lines.push(format!("- {} ({}, views: {})", v.title, v.channel, v.view_count));
        }

        lines.push(String::new());
        lines.push("Similarities".to_string());
        if reply.similarities.is_empty() {
            lines.push("- Not enough consistent overlap extracted yet.".to_string());
        } else {
            lines.extend(reply.similarities.iter().take(8).map(|s| format!("- {s}")));
        }

        lines.push(String::new());
        lines.push("Differences".to_string());
        if reply.differences.is_empty() {
            lines.push("- Not enough strong contrasts extracted yet.".to_string());
        } else {
            lines.extend(reply.differences.iter().take(8).map(|s| format!("- {s}")));
        }

        lines.push(String::new());
        lines.push("Recommended next actions".to_string());
        if reply.recommendations.is_empty() {
            lines.push("- Collect more interviews and compare again.".to_string());
        } else {
            lines.extend(reply.recommendations.iter().take(8).map(|s| format!("- {s}")));
        }

        let summary = ResearchSummary {
            similarities: reply.similarities,
            differences: reply.differences,
            recommendations: reply.recommendations,
            owner_matches: owner_story_videos.iter().map(|v| v.video_id.clone()).collect(),
        };

        (lines.join("\n"), summary)
    }

    async fn extract_topics(
        &self,
        goal: &str,
        intent: &ResearchIntent,
        facts_rows: &[ResearchVideoFact],
    ) -> Vec<(String, f64)> {
        let system = "Extract concise topic tags for cross-domain business learning. Return JSON: \
                      {\"topics\":[{\"tag\":\"...\",\"weight\":0.0-1.0}]} with 5-12 tags.";
        let payload = serde_json::json!({
            "goal_text": goal,
            "intent": intent,
            "facts": facts_rows.iter().map(|f| serde_json::json!({
                "video_id": f.video_id,
                "is_owner_story": f.is_owner_story,
                "confidence": f.confidence,
                "business_model": f.business_model,
                "facts": f.facts,
            })).collect::<Vec<_>>(),
        });
        let payload_text: String = serde_json::to_string(&payload).unwrap_or_default().chars().take(32_000).collect();
        let user = format!("Data:\n{payload_text}");
        let reply: TopicsReply = self
            .chat
            .complete(system, &user, &self.chat_model)
            .await
            .ok()
            .and_then(|(text, _)| extract_json(&text))
            .unwrap_or_default();

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for item in reply.topics {
            let tag = collapse_whitespace(&item.tag.to_lowercase());
            if tag.is_empty() || !seen.insert(tag.clone()) {
                continue;
            }
            out.push((tag.chars().take(120).collect(), item.weight.clamp(0.0, 1.0)));
            if out.len() >= 12 {
                break;
            }
        }
        if !out.is_empty() {
            return out;
        }

        // Fallback tags from intent/facts if the model produced nothing usable.
        let mut fallback = Vec::new();
        let domain = intent.domain.trim().to_lowercase();
        if !domain.is_empty() {
            fallback.push((domain, 0.8));
        }
        for f in facts_rows {
            let bm = f.business_model.trim().to_lowercase();
            if !bm.is_empty() {
                fallback.push((bm, 0.6));
            }
        }
        fallback.truncate(8);
        fallback
    }
}

fn transcript_source_label(source: crate::store::TranscriptSource) -> &'static str {
    use crate::store::TranscriptSource;
    match source {
        TranscriptSource::YoutubeCaptions => "youtube captions",
        TranscriptSource::AudioStt => "audio transcription",
        TranscriptSource::Cached => "cached",
        TranscriptSource::File => "file",
    }
}

/// Accepts a bare JSON object or one wrapped in a fenced code block; returns
/// the type's default if the reply is empty or malformed (spec.md §4.8 step
/// 1: "on empty response, pass through" rather than failing the run).
fn extract_json<T: for<'de> Deserialize<'de>>(text: &str) -> Option<T> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Some(v);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knowledge_juice_goal_embeds_topic() {
        let goal = build_knowledge_juice_goal("  bakery   business  ");
        assert!(goal.contains("bakery business"));
        assert!(goal.starts_with("I want to become successful in"));
    }

    #[test]
    fn knowledge_juice_goal_empty_for_blank_topic() {
        assert_eq!(build_knowledge_juice_goal("   "), "");
    }

    #[test]
    fn extract_json_parses_fenced_block() {
        let text = "```json\n{\"queries\":[\"a\",\"b\"]}\n```";
        let parsed: QueriesReply = extract_json(text).unwrap();
        assert_eq!(parsed.queries, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn extract_json_none_for_garbage() {
        let parsed: Option<QueriesReply> = extract_json("not json at all");
        assert!(parsed.is_none());
    }
}
