//! Retrieval & Q&A Engine (C5): hybrid lexical + semantic chunk retrieval,
//! grounded JSON-contract answers with evidence verification, and a local
//! lexical fallback (spec.md §4.5).
//!
//! Grounded on the teacher's prompt-assembly and `async-openai` call shape;
//! the JSON-contract + evidence-verification pass is new (spec.md §4.5
//! step 8, §8 invariant 5 — the teacher trusts LLM answers directly and
//! has no verification pass).

use crate::analysis::lang::{detect_language, insufficient_message};
use crate::chunking::{chunk_transcript, content_hash as chunk_content_hash, LineChunkConfig};
use crate::config::QaSettings;
use crate::error::{YtCoreError, Result};
use crate::providers::{ChatChain, EmbedChain};
use crate::store::{AnalysisLang, QaCacheEntry, StateStore, StoredChunk};
use crate::transcription::{Transcript, TranscriptSegment};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Final answer returned to callers (API/CLI).
#[derive(Debug, Clone)]
pub struct AskResult {
    pub answer: String,
    pub backend: String,
    pub lang: AnalysisLang,
    pub from_cache: bool,
}

#[derive(Debug, Deserialize)]
struct ContractReply {
    status: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    evidence: Vec<String>,
}

/// Query planner output (spec.md §4.5 step 4), off by default
/// (`qa.enable_planner`).
#[derive(Debug, Deserialize, Default, Clone)]
struct PlannerReply {
    #[serde(default)]
    focus: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    expanded_question: String,
}

/// LLM rerank output (spec.md §4.5 step 6), off by default
/// (`qa.enable_rerank`).
#[derive(Debug, Deserialize, Default)]
struct RerankReply {
    #[serde(default)]
    ordered_ids: Vec<i64>,
}

struct ScoredChunk {
    chunk: StoredChunk,
    score: f32,
}

pub struct QaEngine {
    store: Arc<StateStore>,
    chat: Arc<ChatChain>,
    embed: Arc<EmbedChain>,
    chat_model: String,
    embed_model: String,
    settings: QaSettings,
    notes_dir: PathBuf,
}

impl QaEngine {
    pub fn new(
        store: Arc<StateStore>,
        chat: Arc<ChatChain>,
        embed: Arc<EmbedChain>,
        chat_model: impl Into<String>,
        embed_model: impl Into<String>,
        settings: QaSettings,
        data_dir: &Path,
    ) -> Self {
        Self {
            store,
            chat,
            embed,
            chat_model: chat_model.into(),
            embed_model: embed_model.into(),
            settings,
            notes_dir: data_dir.join("notes").join("exports"),
        }
    }

    #[instrument(skip(self, question, transcript_path))]
    pub async fn ask(
        &self,
        video_id: &str,
        transcript_path: &Path,
        question: &str,
        chat_id: Option<i64>,
        lang_override: Option<AnalysisLang>,
    ) -> Result<AskResult> {
        let stamp = crate::transcript::transcript_stamp(transcript_path)?;
        let question_key = normalize_question_key(question);
        let lang = detect_language(question, lang_override);

        if let Some(record) = self.store.get_record(video_id)? {
            if let Some(hit) = record.find_qa_cache(&question_key, &stamp) {
                info!("qa cache hit for {video_id}");
                return Ok(AskResult {
                    answer: hit.answer.clone(),
                    backend: hit.backend.clone(),
                    lang,
                    from_cache: true,
                });
            }
        }

        // Translation shortcut (spec.md §4.5 step 2): a direct translation
        // request with its own source text never touches transcript
        // retrieval at all.
        if let Some((target_lang, source_text)) = detect_translation_request(question) {
            if let Some((answer, backend)) = self.try_translate(&source_text, &target_lang).await {
                let answer = compact(&answer, 220);
                self.persist(video_id, transcript_path, &stamp, &question_key, question, &answer, &backend, chat_id, lang)?;
                return Ok(AskResult { answer, backend, lang, from_cache: false });
            }
        }

        let content = std::fs::read_to_string(transcript_path)?;
        let lines = crate::transcript::parse_canonical_body(&content);
        if lines.is_empty() {
            return Err(YtCoreError::NoTranscript);
        }

        let chunks = self.ensure_chunks(video_id, &lines).await?;
        if chunks.is_empty() {
            return Err(YtCoreError::NoTranscript);
        }

        let planner = if self.settings.enable_planner { self.run_planner(question).await } else { None };
        let embed_query = planner
            .as_ref()
            .map(|p| p.expanded_question.clone())
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| question.to_string());

        let scored = self.score_chunks(video_id, question, &embed_query, &chunks, planner.as_ref()).await;
        let mut selected = select_with_neighbors(&scored, &chunks, self.settings.top_n);
        if self.settings.enable_rerank {
            if let Some(reranked) = self.rerank(question, &selected).await {
                selected = reranked;
            }
        }
        let context = build_context(&selected, self.settings.max_chars);
        let body_lines: Vec<String> = lines.iter().map(|(_, text)| text.clone()).collect();

        let (answer, backend) = match self.try_grounded_answer(question, &context, &body_lines, lang).await {
            Some((answer, backend)) => (answer, backend),
            None if self.settings.allow_local_fallback => {
                (local_fallback_answer(question, &selected, lang), "local-lexical".to_string())
            }
            None => return Err(YtCoreError::ProviderTransient("no backend produced a valid answer".to_string())),
        };

        let answer = compact(&answer, 220);
        self.persist(video_id, transcript_path, &stamp, &question_key, question, &answer, &backend, chat_id, lang)?;

        Ok(AskResult { answer, backend, lang, from_cache: false })
    }

    /// Loads existing chunks, rebuilding (and re-embedding) only when the
    /// transcript's content hash has drifted (spec.md §4.4/§4.5 step 2-3).
    async fn ensure_chunks(&self, video_id: &str, lines: &[(String, String)]) -> Result<Vec<StoredChunk>> {
        let segments: Vec<TranscriptSegment> = lines
            .iter()
            .map(|(ts, text)| TranscriptSegment::new(parse_mmss(ts), parse_mmss(ts), text.clone()))
            .collect();
        let transcript = Transcript::new(video_id.to_string(), segments);
        let (fresh_chunks, fresh_hash) = chunk_transcript(&transcript, &LineChunkConfig::default());

        let existing = self.store.load_transcript_chunks(video_id)?;
        let existing_hash = if existing.is_empty() { String::new() } else { chunk_content_hash(&existing) };

        let chunks = if existing_hash == fresh_hash && !existing.is_empty() {
            existing
        } else {
            self.store.save_transcript_chunks(video_id, &fresh_hash, &fresh_chunks)?;
            fresh_chunks
        };

        let (stored_embed_hash, stored_count) =
            self.store.get_transcript_embedding_meta(video_id, &self.embed_model)?;
        if stored_embed_hash != fresh_hash || stored_count as usize != chunks.len() {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            match self.embed.embed_batch(&texts).await {
                Ok(vectors) => {
                    let pairs: Vec<(i64, Vec<f32>)> =
                        chunks.iter().map(|c| c.idx).zip(vectors).map(|(idx, v)| (idx, v)).collect();
                    self.store.save_transcript_chunk_embeddings(video_id, &self.embed_model, &fresh_hash, &pairs)?;
                }
                Err(e) => warn!("embedding rebuild failed, semantic scoring degraded: {e}"),
            }
        }

        Ok(chunks)
    }

    async fn score_chunks(
        &self,
        video_id: &str,
        question: &str,
        embed_query: &str,
        chunks: &[StoredChunk],
        planner: Option<&PlannerReply>,
    ) -> Vec<ScoredChunk> {
        let extra_keywords: &[String] = planner.map(|p| p.keywords.as_slice()).unwrap_or(&[]);
        let lexical: Vec<f32> = chunks
            .iter()
            .map(|c| lexical_score(question, extra_keywords, &c.text))
            .collect();
        let max_lex = lexical.iter().cloned().fold(0f32, f32::max).max(1.0);

        let semantic: Option<Vec<(i64, f32)>> = match self.embed.embed(embed_query).await {
            Ok((query_vec, _)) => self
                .store
                .search_transcript_chunks_semantic(video_id, &self.embed_model, &query_vec, chunks.len())
                .ok(),
            Err(e) => {
                warn!("query embedding failed, lexical-only scoring: {e}");
                None
            }
        };

        let total = chunks.len();
        let focus = planner.map(|p| p.focus.as_str()).unwrap_or("any");

        chunks
            .iter()
            .zip(lexical.iter())
            .map(|(chunk, &lex)| {
                let lex_norm = lex / max_lex;
                let base = match &semantic {
                    Some(sims) => {
                        let sem = sims.iter().find(|(idx, _)| *idx == chunk.idx).map(|(_, s)| *s).unwrap_or(0.0);
                        0.45 * lex_norm + 0.55 * sem
                    }
                    None => lex_norm,
                };
                let score = base + focus_boost_for(focus, chunk.idx, total);
                ScoredChunk { chunk: chunk.clone(), score }
            })
            .collect()
    }

    /// Asks for `{focus, keywords[<=8], expanded_question}` JSON (spec.md
    /// §4.5 step 4). Any failure (network, JSON) silently disables
    /// planning for this call — it's a scoring enhancement, never required.
    async fn run_planner(&self, question: &str) -> Option<PlannerReply> {
        let system = "You plan retrieval over a video transcript. Respond with ONLY a JSON object: \
            {\"focus\": \"beginning\"|\"middle\"|\"ending\"|\"any\", \"keywords\": [up to 8 short strings], \
            \"expanded_question\": string}.";
        let user = format!("Question: {question}");
        let (text, _backend) = self.chat.complete(system, &user, &self.chat_model).await.ok()?;
        let mut parsed: PlannerReply = extract_json(&text)?;
        parsed.keywords.truncate(8);
        Some(parsed)
    }

    /// Asks for `{ordered_ids}` over the selected candidates (spec.md §4.5
    /// step 6); returned ids are prefixed in front of the remaining order,
    /// unknown ids are dropped.
    async fn rerank(&self, question: &str, candidates: &[StoredChunk]) -> Option<Vec<StoredChunk>> {
        if candidates.len() <= 1 {
            return None;
        }
        let listing: String = candidates
            .iter()
            .map(|c| format!("id={} text={}", c.idx, compact(&c.text, 160)))
            .collect::<Vec<_>>()
            .join("\n");
        let system = "Reorder transcript chunk ids by relevance to the question. Respond with ONLY a JSON \
            object: {\"ordered_ids\": [ids, most relevant first]}. Only use ids from the candidate list.";
        let user = format!("Question: {question}\n\nCandidates:\n{listing}");
        let (text, _backend) = self.chat.complete(system, &user, &self.chat_model).await.ok()?;
        let parsed: RerankReply = extract_json(&text)?;

        let valid: std::collections::HashSet<i64> = candidates.iter().map(|c| c.idx).collect();
        let mut seen = std::collections::HashSet::new();
        let ordered: Vec<i64> = parsed
            .ordered_ids
            .into_iter()
            .filter(|id| valid.contains(id) && seen.insert(*id))
            .collect();

        let mut result: Vec<StoredChunk> = ordered
            .iter()
            .filter_map(|id| candidates.iter().find(|c| c.idx == *id).cloned())
            .collect();
        for c in candidates {
            if !ordered.contains(&c.idx) {
                result.push(c.clone());
            }
        }
        Some(result)
    }

    /// Direct translation of `source` to `target_lang` ("uk" | "en"),
    /// bypassing transcript retrieval entirely (spec.md §4.5 step 2).
    async fn try_translate(&self, source: &str, target_lang: &str) -> Option<(String, String)> {
        let lang_name = if target_lang == "uk" { "Ukrainian" } else { "English" };
        let system = format!(
            "Translate the user's text to {lang_name}. Respond with only the translation, no commentary."
        );
        self.chat.complete(&system, source, &self.chat_model).await.ok()
    }

    async fn try_grounded_answer(
        &self,
        question: &str,
        context: &str,
        transcript_lines: &[String],
        lang: AnalysisLang,
    ) -> Option<(String, String)> {
        let system = contract_system_prompt(lang);
        let user = format!(
            "Transcript excerpts (each line is `[mm:ss] text`):\n\n{context}\n\nQuestion: {question}\n\n\
             Respond with ONLY a JSON object: {{\"status\": \"answered\" | \"insufficient\", \"answer\": string, \
             \"evidence\": [exact substrings copied verbatim from the excerpts above]}}."
        );

        self.chat
            .complete_each(&system, &user, &self.chat_model, |backend, text| {
                let parsed: ContractReply = extract_json(text)?;
                match parsed.status.as_str() {
                    "insufficient" => Some((insufficient_message(lang).to_string(), backend.to_string())),
                    "answered" => {
                        if parsed.answer.trim().is_empty() || parsed.evidence.is_empty() {
                            return None;
                        }
                        if evidence_verifies(&parsed.evidence, transcript_lines) {
                            Some((parsed.answer, backend.to_string()))
                        } else {
                            None
                        }
                    }
                    _ => None,
                }
            })
            .await
    }

    #[allow(clippy::too_many_arguments)]
    fn persist(
        &self,
        video_id: &str,
        transcript_path: &Path,
        stamp: &str,
        question_key: &str,
        question: &str,
        answer: &str,
        backend: &str,
        chat_id: Option<i64>,
        lang: AnalysisLang,
    ) -> Result<()> {
        if let Some(mut record) = self.store.get_record(video_id)? {
            record.push_qa_cache(
                QaCacheEntry {
                    question_key: question_key.to_string(),
                    transcript_stamp: stamp.to_string(),
                    answer: answer.to_string(),
                    backend: backend.to_string(),
                    saved_at: Utc::now(),
                },
                self.settings.max_cache_entries,
            );
            self.store.upsert_record(record)?;
        }

        let lang_label = match lang {
            AnalysisLang::Uk => "uk",
            AnalysisLang::En => "en",
        };
        self.store.save_transcript_qa_entry(
            video_id,
            &transcript_path.to_string_lossy(),
            question,
            answer,
            "bot",
            chat_id,
            lang_label,
            &serde_json::json!({"backend": backend}),
        )?;

        if let Err(e) = self.export_markdown(video_id, question, answer, backend) {
            warn!("qa markdown export failed: {e}");
        }
        Ok(())
    }

    fn export_markdown(&self, video_id: &str, question: &str, answer: &str, backend: &str) -> Result<()> {
        std::fs::create_dir_all(&self.notes_dir)?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let path = self.notes_dir.join(format!("{video_id}_{stamp}.md"));
        let content = format!(
            "# Question for {video_id}\n\n**Q:** {question}\n\n**A ({backend}):** {answer}\n"
        );
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn contract_system_prompt(lang: AnalysisLang) -> String {
    let directive = match lang {
        AnalysisLang::Uk => "Respond in Ukrainian.",
        AnalysisLang::En => "Respond in English.",
    };
    format!(
        "You answer questions about a video using ONLY the transcript excerpts given. If the excerpts \
         don't contain the answer, say so honestly rather than guessing. Every claim in your answer must \
         be backed by a verbatim substring from the excerpts, listed as evidence. {directive}"
    )
}

/// Accepts a bare JSON object or one wrapped in a fenced code block.
fn extract_json<T: DeserializeOwned>(text: &str) -> Option<T> {
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

/// `[0, 0.25]` boost depending on a chunk's position among `total` chunks
/// and the planner's requested `focus` (spec.md §4.5 step 3/4).
fn focus_boost_for(focus: &str, idx: i64, total: usize) -> f32 {
    if total <= 1 {
        return 0.0;
    }
    let pos = idx as f32 / (total as f32 - 1.0);
    match focus {
        "beginning" => 0.25 * (1.0 - pos),
        "ending" => 0.25 * pos,
        "middle" => {
            let dist_from_middle = (pos - 0.5).abs() * 2.0;
            0.25 * (1.0 - dist_from_middle)
        }
        _ => 0.0,
    }
}

/// Strips a leading `[mm:ss]` stamp and collapses/lowercases whitespace, so
/// evidence lines copied with or without their timestamp prefix compare
/// equal to transcript body lines (spec.md §4.5 step 8,
/// `original_source/video_notes.py::_norm_text_for_match`).
fn normalize_for_match(s: &str) -> String {
    let trimmed = s.trim();
    let without_stamp = if let Some(rest) = trimmed.strip_prefix('[') {
        match rest.find(']') {
            Some(end) => rest[end + 1..].trim_start(),
            None => trimmed,
        }
    } else {
        trimmed
    };
    without_stamp.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// An "answered" response is grounded if **at least one** evidence line
/// verifies against the transcript body, substring-matching in either
/// direction after normalization (spec.md §4.5 step 8, §8 invariant 5;
/// `original_source/video_notes.py::_verify_evidence_lines`). Requiring
/// every evidence line to match would wrongly reject a grounded answer
/// that cites one paraphrased line alongside one verbatim one.
fn evidence_verifies(evidence: &[String], transcript_lines: &[String]) -> bool {
    evidence.iter().any(|e| {
        let normalized_evidence = normalize_for_match(e);
        if normalized_evidence.is_empty() {
            return false;
        }
        transcript_lines.iter().any(|line| {
            let normalized_line = normalize_for_match(line);
            !normalized_line.is_empty()
                && (normalized_line.contains(&normalized_evidence) || normalized_evidence.contains(&normalized_line))
        })
    })
}

/// Recognizes "translate ... to <language>" requests carrying their own
/// source text, quoted or after a colon (spec.md §4.5 step 2).
fn detect_translation_request(question: &str) -> Option<(String, String)> {
    let lower = question.to_lowercase();
    let mentions_translation = lower.contains("translate") || lower.contains("переклад") || lower.contains("перекла");
    if !mentions_translation {
        return None;
    }
    let target_lang = if lower.contains("ukrainian") || lower.contains("українськ") {
        "uk"
    } else if lower.contains("english") || lower.contains("англійськ") {
        "en"
    } else {
        return None;
    };
    let source = extract_quoted_or_after_colon(question)?;
    Some((target_lang.to_string(), source))
}

fn extract_quoted_or_after_colon(question: &str) -> Option<String> {
    if let Some(start) = question.find('"') {
        if let Some(end_rel) = question[start + 1..].find('"') {
            let inner = question[start + 1..start + 1 + end_rel].trim();
            if !inner.is_empty() {
                return Some(inner.to_string());
            }
        }
    }
    if let Some(pos) = question.rfind(':') {
        let tail = question[pos + 1..].trim();
        if !tail.is_empty() {
            return Some(tail.to_string());
        }
    }
    None
}

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "to", "of", "in", "on", "for", "and", "or", "what",
    "how", "why", "does", "do", "did", "it", "this", "that", "with", "about", "can", "you",
];

fn keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Sums `1 + min(1.5, 0.2 * occurrence_count)` per matched keyword, over
/// the question's own keywords and the planner's extra keywords
/// (deduplicated), plus a `+3` bonus if the whole question appears
/// verbatim in the chunk (spec.md §4.5 step 3,
/// `original_source/video_notes.py:1505-1510`).
fn lexical_score(question: &str, extra_keywords: &[String], chunk_text: &str) -> f32 {
    let chunk_lower = chunk_text.to_lowercase();

    let mut all_words = keywords(question);
    for w in extra_keywords {
        let w = w.trim().to_lowercase();
        if !w.is_empty() && !all_words.contains(&w) {
            all_words.push(w);
        }
    }

    let mut score = 0.0f32;
    for word in &all_words {
        let count = chunk_lower.matches(word.as_str()).count() as f32;
        if count > 0.0 {
            score += 1.0 + (0.2 * count).min(1.5);
        }
    }
    if !all_words.is_empty() && chunk_lower.contains(&question.trim().to_lowercase()) {
        score += 3.0;
    }
    score
}

fn select_with_neighbors(scored: &[ScoredChunk], all: &[StoredChunk], top_n: usize) -> Vec<StoredChunk> {
    let mut ranked: Vec<&ScoredChunk> = scored.iter().collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut selected_idx: std::collections::BTreeSet<i64> = std::collections::BTreeSet::new();
    for s in ranked.into_iter().take(top_n.max(1)) {
        selected_idx.insert(s.chunk.idx);
        selected_idx.insert(s.chunk.idx - 1);
        selected_idx.insert(s.chunk.idx + 1);
    }

    all.iter().filter(|c| selected_idx.contains(&c.idx)).cloned().collect()
}

fn build_context(chunks: &[StoredChunk], max_chars: usize) -> String {
    let mut out = String::new();
    for chunk in chunks {
        let line = format!("[{}] {}\n", format_mmss(chunk.start_ts), chunk.text);
        if out.len() + line.len() > max_chars {
            break;
        }
        out.push_str(&line);
    }
    out
}

fn local_fallback_answer(question: &str, chunks: &[StoredChunk], lang: AnalysisLang) -> String {
    let q_words = keywords(question);
    let best = chunks
        .iter()
        .max_by_key(|c| q_words.iter().filter(|w| c.text.to_lowercase().contains(w.as_str())).count());
    match best {
        Some(chunk) if !q_words.is_empty() => {
            let excerpt: String = chunk.text.chars().take(300).collect();
            format!("{}\n\n({excerpt})", insufficient_message(lang))
        }
        _ => insufficient_message(lang).to_string(),
    }
}

fn compact(answer: &str, max_chars: usize) -> String {
    if answer.chars().count() <= max_chars {
        return answer.to_string();
    }
    let truncated: String = answer.chars().take(max_chars).collect();
    match truncated.rfind(' ') {
        Some(pos) => format!("{}…", &truncated[..pos]),
        None => format!("{truncated}…"),
    }
}

fn normalize_question_key(question: &str) -> String {
    question.trim().to_lowercase()
}

fn format_mmss(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn parse_mmss(ts: &str) -> f64 {
    let mut parts = ts.split(':');
    let mins: f64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let secs: f64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0.0);
    mins * 60.0 + secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_score_rewards_keyword_matches() {
        let high = lexical_score("what is rust ownership", &[], "rust ownership means the compiler tracks values");
        let low = lexical_score("what is rust ownership", &[], "completely unrelated cooking content here");
        assert!(high > low);
    }

    #[test]
    fn compact_truncates_at_word_boundary() {
        let long = "word ".repeat(100);
        let out = compact(&long, 20);
        assert!(out.chars().count() <= 21);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn compact_is_noop_under_limit() {
        assert_eq!(compact("short", 220), "short");
    }

    #[test]
    fn mmss_round_trips() {
        assert_eq!(format_mmss(parse_mmss("01:05")), "01:05");
    }

    #[test]
    fn extract_json_handles_fenced_block() {
        let text = "```json\n{\"status\":\"answered\",\"answer\":\"x\",\"evidence\":[\"y\"]}\n```";
        let parsed: ContractReply = extract_json(text).unwrap();
        assert_eq!(parsed.status, "answered");
    }

    #[test]
    fn select_with_neighbors_includes_adjacent_chunks() {
        let chunks: Vec<StoredChunk> =
            (0..5).map(|i| StoredChunk { idx: i, start_ts: i as f64, end_ts: i as f64 + 1.0, text: format!("c{i}") }).collect();
        let scored: Vec<ScoredChunk> = chunks
            .iter()
            .map(|c| ScoredChunk { chunk: c.clone(), score: if c.idx == 2 { 10.0 } else { 0.0 } })
            .collect();
        let selected = select_with_neighbors(&scored, &chunks, 1);
        let idxs: Vec<i64> = selected.iter().map(|c| c.idx).collect();
        assert!(idxs.contains(&1));
        assert!(idxs.contains(&2));
        assert!(idxs.contains(&3));
    }

    #[test]
    fn focus_boost_favors_requested_region() {
        let total = 10;
        assert!(focus_boost_for("beginning", 0, total) > focus_boost_for("beginning", 9, total));
        assert!(focus_boost_for("ending", 9, total) > focus_boost_for("ending", 0, total));
        assert!(focus_boost_for("middle", 5, total) > focus_boost_for("middle", 0, total));
        assert_eq!(focus_boost_for("any", 5, total), 0.0);
    }

    #[test]
    fn detect_translation_request_reads_quoted_source() {
        let (lang, source) =
            detect_translation_request("Please translate to Ukrainian: \"hello world\"").unwrap();
        assert_eq!(lang, "uk");
        assert_eq!(source, "hello world");
    }

    #[test]
    fn detect_translation_request_ignores_unrelated_questions() {
        assert!(detect_translation_request("What is the revenue target?").is_none());
    }

    #[test]
    fn rerank_reply_parses_from_fenced_json() {
        let text = "```json\n{\"ordered_ids\": [3, 1, 2]}\n```";
        let parsed: RerankReply = extract_json(text).unwrap();
        assert_eq!(parsed.ordered_ids, vec![3, 1, 2]);
    }
}
