//! State Store (C1): persistent durable storage for the archive index,
//! research runs, transcript chunks/embeddings, and Q&A history.
//!
//! Grounded on the teacher's `vector_store::SqliteVectorStore` for the
//! `Mutex<Connection>` + WAL + `CREATE TABLE IF NOT EXISTS` pattern, and on
//! `original_source/src/youtube_direct_bot/state_store/*.py` for the exact
//! table shapes and full-replace/upsert semantics.

mod schema;
pub mod types;

pub use types::*;

use crate::error::{YtCoreError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, instrument};

/// Durable state store backed by SQLite.
///
/// Schema initialization is lazy and idempotent: the first call through any
/// public method runs `ensure_ready`, guarded by the same connection mutex
/// so concurrent callers can't race the `CREATE TABLE` statements (the
/// original's `ensure_db_ready` double-checked lock serves the same role).
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_ready()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_ready()?;
        Ok(store)
    }

    fn ensure_ready(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(schema::SCHEMA)?;
        info!("state store schema ready");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| YtCoreError::Database(rusqlite::Error::InvalidParameterName(e.to_string())))
    }

    // === known_chats ===

    pub fn load_known_chats(&self) -> Result<HashSet<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT chat_id FROM known_chats")?;
        let rows = stmt.query_map([], |r| r.get::<_, i64>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn save_known_chats(&self, chats: &HashSet<i64>) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM known_chats", [])?;
        for chat_id in chats {
            tx.execute("INSERT INTO known_chats (chat_id) VALUES (?1)", params![chat_id])?;
        }
        tx.commit()?;
        Ok(())
    }

    // === archive_index ===

    /// Load the full archive index. Individual record writes are always a
    /// read-modify-write against this full map (spec.md §4.1).
    pub fn load_index(&self) -> Result<HashMap<String, ArchiveRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT video_id, record FROM archive_index")?;
        let rows = stmt.query_map([], |r| {
            let video_id: String = r.get(0)?;
            let record_json: String = r.get(1)?;
            Ok((video_id, record_json))
        })?;

        let mut out = HashMap::new();
        for row in rows.filter_map(|r| r.ok()) {
            let (video_id, record_json) = row;
            if let Ok(record) = serde_json::from_str::<ArchiveRecord>(&record_json) {
                out.insert(video_id, record);
            }
        }
        Ok(out)
    }

    /// Atomically replace the full archive index mapping.
    pub fn save_index(&self, index: &HashMap<String, ArchiveRecord>) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM archive_index", [])?;
        let now = Utc::now().to_rfc3339();
        for (video_id, record) in index {
            let record_json = serde_json::to_string(record)?;
            tx.execute(
                "INSERT INTO archive_index (video_id, record, updated_at) VALUES (?1, ?2, ?3)",
                params![video_id, record_json, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Convenience read-modify-write for a single record.
    pub fn upsert_record(&self, record: ArchiveRecord) -> Result<()> {
        let mut index = self.load_index()?;
        index.insert(record.video_id.clone(), record);
        self.save_index(&index)
    }

    pub fn get_record(&self, video_id: &str) -> Result<Option<ArchiveRecord>> {
        Ok(self.load_index()?.remove(video_id))
    }

    // === research runs ===

    pub fn create_research_run(
        &self,
        chat_id: i64,
        goal_text: &str,
        intent: &ResearchIntent,
        is_public: bool,
    ) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO research_runs
             (run_id, chat_id, goal_text, is_public, intent_json, status, report_text, summary_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'running', '', '{}', ?6, ?6)",
            params![
                run_id,
                chat_id,
                goal_text.trim(),
                is_public as i64,
                serde_json::to_string(intent)?,
                now,
            ],
        )?;
        Ok(run_id)
    }

    pub fn finalize_research_run(
        &self,
        run_id: &str,
        status: RunStatus,
        report_text: &str,
        summary: &ResearchSummary,
    ) -> Result<()> {
        let conn = self.lock()?;
        let status_str = match status {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        conn.execute(
            "UPDATE research_runs SET status = ?1, report_text = ?2, summary_json = ?3, updated_at = ?4
             WHERE run_id = ?5",
            params![
                status_str,
                report_text.trim(),
                serde_json::to_string(summary)?,
                Utc::now().to_rfc3339(),
                run_id,
            ],
        )?;
        Ok(())
    }

    pub fn save_research_videos(&self, run_id: &str, videos: &[ResearchVideo]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM research_videos WHERE run_id = ?1", params![run_id])?;
        let now = Utc::now().to_rfc3339();
        for v in videos {
            if v.video_id.trim().is_empty() {
                continue;
            }
            tx.execute(
                "INSERT INTO research_videos
                 (run_id, video_id, rank, url, title, channel, view_count, published_utc,
                  popularity_score, transcript_path, transcript_source, transcript_chars,
                  meta_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, '', '', 0, ?10, ?11, ?11)",
                params![
                    run_id,
                    v.video_id,
                    v.rank,
                    v.url,
                    v.title,
                    v.channel,
                    v.view_count,
                    v.published_utc,
                    v.popularity_score,
                    v.meta.to_string(),
                    now,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn save_research_video_transcript(
        &self,
        run_id: &str,
        video_id: &str,
        transcript_path: &str,
        transcript_source: &str,
        transcript_chars: i64,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE research_videos SET transcript_path = ?1, transcript_source = ?2,
             transcript_chars = ?3, updated_at = ?4 WHERE run_id = ?5 AND video_id = ?6",
            params![
                transcript_path,
                transcript_source,
                transcript_chars.max(0),
                Utc::now().to_rfc3339(),
                run_id,
                video_id,
            ],
        )?;
        Ok(())
    }

    pub fn save_research_video_fact(
        &self,
        run_id: &str,
        video_id: &str,
        fact: &ResearchVideoFact,
    ) -> Result<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let confidence = fact.confidence.clamp(0.0, 1.0);
        let business_model: String = fact.business_model.chars().take(300).collect();
        conn.execute(
            "INSERT INTO research_video_facts
             (run_id, video_id, is_owner_story, confidence, business_model, facts_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (run_id, video_id) DO UPDATE SET
                is_owner_story = excluded.is_owner_story,
                confidence = excluded.confidence,
                business_model = excluded.business_model,
                facts_json = excluded.facts_json,
                updated_at = excluded.updated_at",
            params![
                run_id,
                video_id,
                fact.is_owner_story,
                confidence,
                business_model,
                fact.facts.to_string(),
                now,
            ],
        )?;
        Ok(())
    }

    pub fn load_research_videos(&self, run_id: &str) -> Result<Vec<ResearchVideo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, rank, url, title, channel, view_count, published_utc,
                    popularity_score, transcript_path, transcript_source, transcript_chars, meta_json
             FROM research_videos WHERE run_id = ?1 ORDER BY rank ASC, popularity_score DESC",
        )?;
        let rows = stmt.query_map(params![run_id], |r| {
            let meta_json: String = r.get(11)?;
            Ok(ResearchVideo {
                run_id: run_id.to_string(),
                video_id: r.get(0)?,
                rank: r.get(1)?,
                url: r.get(2)?,
                title: r.get(3)?,
                channel: r.get(4)?,
                view_count: r.get(5)?,
                published_utc: r.get(6)?,
                popularity_score: r.get(7)?,
                transcript_path: r.get(8)?,
                transcript_source: r.get(9)?,
                transcript_chars: r.get(10)?,
                meta: serde_json::from_str(&meta_json).unwrap_or(serde_json::json!({})),
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn load_research_video_facts(&self, run_id: &str) -> Result<Vec<ResearchVideoFact>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, is_owner_story, confidence, business_model, facts_json
             FROM research_video_facts WHERE run_id = ?1 ORDER BY video_id ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |r| {
            let facts_json: String = r.get(4)?;
            Ok(ResearchVideoFact {
                run_id: run_id.to_string(),
                video_id: r.get(0)?,
                is_owner_story: r.get(1)?,
                confidence: r.get(2)?,
                business_model: r.get(3)?,
                facts: serde_json::from_str(&facts_json).unwrap_or(serde_json::json!({})),
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Normalize, dedupe (first-seen tag, last-seen weight), clamp, cap
    /// length, then full-replace the run's topic set.
    pub fn save_research_topics(&self, run_id: &str, topics: &[(String, f64)]) -> Result<()> {
        let mut seen_order = Vec::new();
        let mut weights: HashMap<String, f64> = HashMap::new();
        for (tag, weight) in topics {
            let normalized = normalize_tag(tag);
            if normalized.is_empty() {
                continue;
            }
            if !weights.contains_key(&normalized) {
                seen_order.push(normalized.clone());
            }
            weights.insert(normalized, weight.clamp(0.0, 1.0));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM research_run_topics WHERE run_id = ?1", params![run_id])?;
        let now = Utc::now().to_rfc3339();
        for tag in &seen_order {
            let weight = weights[tag];
            tx.execute(
                "INSERT INTO research_run_topics (run_id, topic_tag, weight, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![run_id, tag, weight, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_public_research_runs(&self, limit: i64) -> Result<Vec<ResearchRun>> {
        let limit = limit.max(1);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, chat_id, goal_text, status, report_text, summary_json, intent_json, created_at, updated_at
             FROM research_runs WHERE is_public = 1 ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], row_to_research_run)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn get_public_research_run(&self, run_id: &str) -> Result<Option<ResearchRun>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT run_id, chat_id, goal_text, status, report_text, summary_json, intent_json, created_at, updated_at
             FROM research_runs WHERE run_id = ?1 AND is_public = 1",
            params![run_id],
            row_to_research_run,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn load_run_topics(&self, run_id: &str) -> Result<Vec<ResearchTopic>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT topic_tag, weight FROM research_run_topics WHERE run_id = ?1 ORDER BY weight DESC, topic_tag ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |r| {
            Ok(ResearchTopic {
                tag: r.get(0)?,
                weight: r.get(1)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Tags co-occurring with `base_tags` in other public runs, excluding
    /// `base_tags` themselves and rows from `exclude_run_id`.
    pub fn load_related_public_topics(
        &self,
        base_tags: &[String],
        exclude_run_id: &str,
        limit: i64,
    ) -> Result<Vec<RelatedTopic>> {
        let tags: Vec<String> = base_tags
            .iter()
            .map(|t| normalize_tag(t))
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let tag_set: HashSet<&str> = tags.iter().map(|s| s.as_str()).collect();
        let limit = limit.max(1) as usize;

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT rt.run_id, rt.topic_tag, rt.weight
             FROM research_run_topics rt
             JOIN research_runs rr ON rr.run_id = rt.run_id
             WHERE rr.is_public = 1",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, f64>(2)?))
        })?;

        let mut matched_runs: HashSet<String> = HashSet::new();
        let mut all_rows: Vec<(String, String, f64)> = Vec::new();
        for row in rows.filter_map(|r| r.ok()) {
            all_rows.push(row.clone());
            let (run_id, topic_tag, _weight) = row;
            if run_id != exclude_run_id && tag_set.contains(topic_tag.as_str()) {
                matched_runs.insert(run_id);
            }
        }

        let mut counts: HashMap<String, (HashSet<String>, f64)> = HashMap::new();
        for (run_id, topic_tag, weight) in all_rows {
            if !matched_runs.contains(&run_id) || tag_set.contains(topic_tag.as_str()) {
                continue;
            }
            let entry = counts.entry(topic_tag).or_insert_with(|| (HashSet::new(), 0.0));
            entry.0.insert(run_id);
            if weight > entry.1 {
                entry.1 = weight;
            }
        }

        let mut out: Vec<RelatedTopic> = counts
            .into_iter()
            .map(|(tag, (runs, max_weight))| RelatedTopic {
                tag,
                run_count: runs.len() as i64,
                max_weight,
            })
            .collect();
        out.sort_by(|a, b| {
            b.run_count
                .cmp(&a.run_count)
                .then(b.max_weight.partial_cmp(&a.max_weight).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.tag.cmp(&b.tag))
        });
        out.truncate(limit);
        Ok(out)
    }

    // === transcript chunks & embeddings ===

    pub fn save_transcript_chunks(&self, video_id: &str, content_hash: &str, chunks: &[StoredChunk]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM transcript_chunks WHERE video_id = ?1", params![video_id])?;
        let now = Utc::now().to_rfc3339();
        for chunk in chunks {
            tx.execute(
                "INSERT INTO transcript_chunks (video_id, chunk_idx, content_hash, chunk_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![video_id, chunk.idx, content_hash, serde_json::to_string(chunk)?, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_transcript_chunks(&self, video_id: &str) -> Result<Vec<StoredChunk>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT chunk_json FROM transcript_chunks WHERE video_id = ?1 ORDER BY chunk_idx ASC",
        )?;
        let rows = stmt.query_map(params![video_id], |r| r.get::<_, String>(0))?;
        Ok(rows
            .filter_map(|r| r.ok())
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect())
    }

    /// `(stored_hash, count)` for `(video_id, model)`; empty/zero if absent.
    pub fn get_transcript_embedding_meta(&self, video_id: &str, model: &str) -> Result<(String, i64)> {
        let conn = self.lock()?;
        let row: (Option<String>, i64) = conn.query_row(
            "SELECT MAX(content_hash), COUNT(*) FROM transcript_chunk_embeddings WHERE video_id = ?1 AND model = ?2",
            params![video_id, model],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok((row.0.unwrap_or_default(), row.1))
    }

    pub fn save_transcript_chunk_embeddings(
        &self,
        video_id: &str,
        model: &str,
        content_hash: &str,
        vectors: &[(i64, Vec<f32>)],
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM transcript_chunk_embeddings WHERE video_id = ?1 AND model = ?2",
            params![video_id, model],
        )?;
        let now = Utc::now().to_rfc3339();
        for (idx, vec) in vectors {
            if vec.is_empty() {
                continue;
            }
            let bytes: Vec<u8> = vec.iter().flat_map(|f| f.to_le_bytes()).collect();
            tx.execute(
                "INSERT INTO transcript_chunk_embeddings
                 (video_id, chunk_idx, model, content_hash, embedding, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![video_id, idx, model, content_hash, bytes, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Full scan + in-Rust cosine similarity, sorted by decreasing similarity.
    pub fn search_transcript_chunks_semantic(
        &self,
        video_id: &str,
        model: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(i64, f32)>> {
        if query_vector.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT chunk_idx, embedding FROM transcript_chunk_embeddings WHERE video_id = ?1 AND model = ?2",
        )?;
        let rows = stmt.query_map(params![video_id, model], |r| {
            let idx: i64 = r.get(0)?;
            let bytes: Vec<u8> = r.get(1)?;
            Ok((idx, bytes))
        })?;

        let mut scored: Vec<(i64, f32)> = rows
            .filter_map(|r| r.ok())
            .map(|(idx, bytes)| {
                let vec: Vec<f32> = bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes(c.try_into().unwrap_or_default()))
                    .collect();
                let sim = cosine_similarity(query_vector, &vec);
                (idx, (sim + 1.0) / 2.0)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit.max(1));
        Ok(scored)
    }

    // === QA history ===

    #[allow(clippy::too_many_arguments)]
    pub fn save_transcript_qa_entry(
        &self,
        video_id: &str,
        transcript_path: &str,
        question: &str,
        answer: &str,
        source: &str,
        chat_id: Option<i64>,
        lang: &str,
        extra: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO transcript_qa_history
             (video_id, transcript_path, question, answer, source, chat_id, lang, extra_json, asked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                video_id.trim(),
                transcript_path.trim(),
                question.trim(),
                answer.trim(),
                if source.trim().is_empty() { "bot" } else { source.trim() },
                chat_id,
                lang.trim(),
                extra.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load_recent_searches(&self, limit: i64) -> Result<Vec<QaHistoryEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, transcript_path, question, answer, source, chat_id, lang, extra_json, asked_at
             FROM transcript_qa_history ORDER BY asked_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit.max(1)], |r| {
            let extra_json: String = r.get(7)?;
            let asked_at: String = r.get(8)?;
            Ok(QaHistoryEntry {
                video_id: r.get(0)?,
                transcript_path: r.get(1)?,
                question: r.get(2)?,
                answer: r.get(3)?,
                source: r.get(4)?,
                chat_id: r.get(5)?,
                lang: r.get(6)?,
                extra: serde_json::from_str(&extra_json).unwrap_or(serde_json::json!({})),
                asked_at: chrono::DateTime::parse_from_rfc3339(&asked_at)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn row_to_research_run(r: &rusqlite::Row) -> rusqlite::Result<ResearchRun> {
    let run_id: String = r.get(0)?;
    let chat_id: i64 = r.get(1)?;
    let goal_text: String = r.get(2)?;
    let status: String = r.get(3)?;
    let report_text: String = r.get(4)?;
    let summary_json: String = r.get(5)?;
    let intent_json: String = r.get(6)?;
    let created_at: String = r.get(7)?;
    let updated_at: String = r.get(8)?;

    Ok(ResearchRun {
        run_id,
        chat_id,
        goal_text,
        is_public: true,
        intent: serde_json::from_str(&intent_json).unwrap_or_default(),
        status: match status.as_str() {
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Running,
        },
        report_text,
        summary: serde_json::from_str(&summary_json).unwrap_or_default(),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn normalize_tag(tag: &str) -> String {
    let collapsed = tag.trim().to_lowercase();
    let collapsed: String = collapsed.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(120).collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trip_preserves_equality() {
        let store = StateStore::in_memory().unwrap();
        let mut index = HashMap::new();
        index.insert(
            "v1".to_string(),
            ArchiveRecord::new("v1", "Title", "https://example.com"),
        );
        store.save_index(&index).unwrap();
        let loaded = store.load_index().unwrap();
        assert_eq!(loaded.get("v1").unwrap().title, "Title");
    }

    #[test]
    fn known_chats_round_trip_is_noop_modulo_set_semantics() {
        let store = StateStore::in_memory().unwrap();
        let mut chats = HashSet::new();
        chats.insert(1);
        chats.insert(2);
        store.save_known_chats(&chats).unwrap();
        assert_eq!(store.load_known_chats().unwrap(), chats);
    }

    #[test]
    fn research_topics_dedup_keeps_first_seen_last_weight() {
        let store = StateStore::in_memory().unwrap();
        let run_id = store
            .create_research_run(1, "goal", &ResearchIntent::default(), true)
            .unwrap();
        store
            .save_research_topics(
                &run_id,
                &[("a".into(), 0.2), ("a".into(), 0.9), ("b".into(), 0.5)],
            )
            .unwrap();
        let topics = store.load_run_topics(&run_id).unwrap();
        assert_eq!(topics.len(), 2);
        let a = topics.iter().find(|t| t.tag == "a").unwrap();
        assert!((a.weight - 0.9).abs() < 1e-9);
    }

    #[test]
    fn related_topics_exclude_base_tags_and_excluded_run() {
        let store = StateStore::in_memory().unwrap();
        let r1 = store
            .create_research_run(1, "g1", &ResearchIntent::default(), true)
            .unwrap();
        let r2 = store
            .create_research_run(1, "g2", &ResearchIntent::default(), true)
            .unwrap();
        store
            .save_research_topics(&r1, &[("bakery".into(), 1.0), ("ovens".into(), 0.8)])
            .unwrap();
        store
            .save_research_topics(&r2, &[("bakery".into(), 1.0), ("branding".into(), 0.6)])
            .unwrap();

        let related = store
            .load_related_public_topics(&["bakery".to_string()], &r1, 10)
            .unwrap();
        let tags: Vec<&str> = related.iter().map(|t| t.tag.as_str()).collect();
        assert!(!tags.contains(&"bakery"));
        assert!(tags.contains(&"branding"));
    }

    #[test]
    fn chunk_embedding_rebuild_condition() {
        let store = StateStore::in_memory().unwrap();
        store
            .save_transcript_chunk_embeddings("v1", "openai:text-embedding-3-small", "hash1", &[(0, vec![1.0, 0.0])])
            .unwrap();
        let (hash, count) = store
            .get_transcript_embedding_meta("v1", "openai:text-embedding-3-small")
            .unwrap();
        assert_eq!(hash, "hash1");
        assert_eq!(count, 1);
    }

    #[test]
    fn semantic_search_sorted_descending() {
        let store = StateStore::in_memory().unwrap();
        store
            .save_transcript_chunk_embeddings(
                "v1",
                "m",
                "h",
                &[(0, vec![1.0, 0.0]), (1, vec![0.0, 1.0]), (2, vec![0.9, 0.1])],
            )
            .unwrap();
        let results = store
            .search_transcript_chunks_semantic("v1", "m", &[1.0, 0.0], 3)
            .unwrap();
        assert_eq!(results[0].0, 0);
        assert!(results[0].1 >= results[1].1 && results[1].1 >= results[2].1);
    }
}
