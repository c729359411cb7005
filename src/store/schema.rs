//! Schema DDL for the State Store.
//!
//! Table shapes follow spec.md §6 (names are normative there); columns
//! and full-replace semantics are grounded on
//! `original_source/src/youtube_direct_bot/state_store/*.py`.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS known_chats (
    chat_id INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS bot_meta (
    key TEXT PRIMARY KEY,
    value_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS archive_index (
    video_id TEXT PRIMARY KEY,
    record TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS research_runs (
    run_id TEXT PRIMARY KEY,
    chat_id INTEGER NOT NULL,
    goal_text TEXT NOT NULL,
    is_public INTEGER NOT NULL,
    intent_json TEXT NOT NULL,
    status TEXT NOT NULL,
    report_text TEXT NOT NULL DEFAULT '',
    summary_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_research_runs_public_created
    ON research_runs(is_public, created_at DESC);

CREATE TABLE IF NOT EXISTS research_videos (
    run_id TEXT NOT NULL,
    video_id TEXT NOT NULL,
    rank INTEGER NOT NULL DEFAULT 0,
    url TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    channel TEXT NOT NULL DEFAULT '',
    view_count INTEGER NOT NULL DEFAULT 0,
    published_utc TEXT NOT NULL DEFAULT '',
    popularity_score REAL NOT NULL DEFAULT 0,
    transcript_path TEXT NOT NULL DEFAULT '',
    transcript_source TEXT NOT NULL DEFAULT '',
    transcript_chars INTEGER NOT NULL DEFAULT 0,
    meta_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (run_id, video_id)
);

CREATE INDEX IF NOT EXISTS idx_research_videos_run
    ON research_videos(run_id, rank ASC, popularity_score DESC);

CREATE TABLE IF NOT EXISTS research_video_facts (
    run_id TEXT NOT NULL,
    video_id TEXT NOT NULL,
    is_owner_story INTEGER,
    confidence REAL NOT NULL DEFAULT 0,
    business_model TEXT NOT NULL DEFAULT '',
    facts_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (run_id, video_id)
);

CREATE TABLE IF NOT EXISTS research_run_topics (
    run_id TEXT NOT NULL,
    topic_tag TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    PRIMARY KEY (run_id, topic_tag)
);

CREATE INDEX IF NOT EXISTS idx_research_run_topics_tag ON research_run_topics(topic_tag);

CREATE TABLE IF NOT EXISTS transcript_qa_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id TEXT NOT NULL,
    transcript_path TEXT NOT NULL DEFAULT '',
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'bot',
    chat_id INTEGER,
    lang TEXT NOT NULL DEFAULT '',
    extra_json TEXT NOT NULL DEFAULT '{}',
    asked_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_qa_history_asked_at ON transcript_qa_history(asked_at DESC);
CREATE INDEX IF NOT EXISTS idx_qa_history_video ON transcript_qa_history(video_id);

CREATE TABLE IF NOT EXISTS transcript_chunks (
    video_id TEXT NOT NULL,
    chunk_idx INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    chunk_json TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (video_id, chunk_idx)
);

CREATE TABLE IF NOT EXISTS transcript_chunk_embeddings (
    video_id TEXT NOT NULL,
    chunk_idx INTEGER NOT NULL,
    model TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    embedding BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (video_id, chunk_idx, model)
);

CREATE INDEX IF NOT EXISTS idx_chunk_embeddings_video_model
    ON transcript_chunk_embeddings(video_id, model);
"#;
