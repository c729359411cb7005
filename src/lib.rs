//! YtCore - YouTube Knowledge Pipeline
//!
//! A local-first service for recording live/VOD YouTube streams, transcribing
//! them, answering grounded questions over the transcript archive, and
//! running multi-step "Knowledge Juice" research jobs that compare how real
//! creators built their businesses.
//!
//! # Overview
//!
//! YtCore allows you to:
//! - Supervise live/VOD recording of YouTube channels and build a searchable
//!   transcript archive
//! - Ask grounded questions over that archive with citations
//! - Run Knowledge Juice research jobs: find owner/operator videos on a
//!   topic, extract facts from their transcripts, and compare them
//! - Drive all of the above through an HTTP/WebSocket API with live job
//!   progress events
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `store` - Shared archival state (SQLite-backed)
//! - `media` - Media source abstraction (YouTube, local files)
//! - `transcript` - Transcript pipeline (captions, STT fallback, caching)
//! - `chunking` - Content chunking strategies
//! - `embedding` - Embedding generation
//! - `providers` - Ordered LLM chat / embedding provider chains with retry
//! - `qa` - Grounded question answering
//! - `analysis` - Channel/video analysis jobs
//! - `live` - Live/VOD recording supervisor
//! - `search` - Video search provider for research candidate collection
//! - `research` - Knowledge Juice research job engine
//! - `jobs` - Job registry and event bus
//! - `api` - HTTP/WebSocket API surface
//!
//! # Example
//!
//! ```rust,no_run
//! use ytcore::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     ytcore::api::run_serve("127.0.0.1", 3000, settings).await?;
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod api;
pub mod audio;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod jobs;
pub mod live;
pub mod media;
pub mod openai;
pub mod providers;
pub mod qa;
pub mod research;
pub mod search;
pub mod store;
pub mod transcript;
pub mod transcription;

pub use error::{Result, YtCoreError};
