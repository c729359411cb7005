//! Provider chains (C5/C6/C8 shared infrastructure): ordered chat and
//! embedding backends with client-side rate limiting, replacing the
//! teacher's single hardcoded OpenAI client with the fallback-chain
//! design spec.md §9 calls for.

pub mod chat;
pub mod embedding;
pub mod ratelimit;

pub use chat::{ChatBackend, ChatChain};
pub use embedding::EmbedChain;
pub use ratelimit::RateLimiter;
