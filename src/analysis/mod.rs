//! Analysis Engine (C6): long-form transcript analysis with chunk-map-reduce
//! for long inputs.
//!
//! Reuses `transcription::fusion::TranscriptionProcessor`'s two-phase
//! shape (per-chunk LLM call, then a merge call) for windowing analysis
//! prose instead of fusing transcript segments; language detection stays
//! a small, pure function rather than another LLM round trip.

pub mod lang;

pub use lang::detect_language;

use crate::providers::ChatChain;
use crate::store::AnalysisLang;
use tracing::warn;

/// Transcript length (chars) at/above which the local-only chain switches
/// to chunked map-reduce instead of a single call.
const MAP_REDUCE_TRIGGER_CHARS: usize = 12_000;
const WINDOW_CHARS: usize = 6_000;
const WINDOW_OVERLAP_CHARS: usize = 500;
/// Char budget for a single-shot call to a cloud backend.
const SINGLE_CALL_MAX_CHARS: usize = 60_000;

pub struct AnalysisEngine {
    chat: std::sync::Arc<ChatChain>,
    model: String,
    /// True when the configured chat chain is local-only — triggers the
    /// map-reduce path for long transcripts instead of a single call.
    primary_is_local: bool,
}

impl AnalysisEngine {
    pub fn new(chat: std::sync::Arc<ChatChain>, model: impl Into<String>, primary_is_local: bool) -> Self {
        Self { chat, model: model.into(), primary_is_local }
    }

    /// Analyze `transcript_text` and return a single banner-prefixed
    /// analysis string, or an empty string on total failure — the caller
    /// decides whether to surface an error.
    pub async fn analyze(
        &self,
        transcript_text: &str,
        title: &str,
        lang_override: Option<AnalysisLang>,
    ) -> String {
        let lang = detect_language(transcript_text, lang_override);

        if self.primary_is_local && transcript_text.chars().count() >= MAP_REDUCE_TRIGGER_CHARS {
            self.map_reduce(transcript_text, title, lang).await
        } else {
            self.single_call(transcript_text, title, lang).await
        }
    }

    async fn single_call(&self, transcript_text: &str, title: &str, lang: AnalysisLang) -> String {
        let (truncated, was_truncated) = truncate_chars(transcript_text, SINGLE_CALL_MAX_CHARS);
        let system = system_prompt(lang);
        let user = analysis_user_prompt(title, &truncated);

        match self.chat.complete(&system, &user, &self.model).await {
            Ok((text, backend)) => banner(&backend, lang, was_truncated, &text),
            Err(e) => {
                warn!("analysis single call failed: {e}");
                String::new()
            }
        }
    }

    async fn map_reduce(&self, transcript_text: &str, title: &str, lang: AnalysisLang) -> String {
        let windows = split_word_boundary_windows(transcript_text, WINDOW_CHARS, WINDOW_OVERLAP_CHARS);
        let part_system = part_system_prompt(lang);

        let mut parts = Vec::new();
        for (i, window) in windows.iter().enumerate() {
            let user = format!(
                "Part {}/{} of a longer transcript titled \"{title}\":\n\n{window}",
                i + 1,
                windows.len()
            );
            match self.chat.complete(&part_system, &user, &self.model).await {
                Ok((text, _backend)) => parts.push(text),
                Err(e) => warn!("analysis part {} failed: {e}", i + 1),
            }
        }

        if parts.is_empty() {
            return String::new();
        }

        let merge_system = merge_system_prompt(lang);
        let merge_user = format!(
            "Merge these {} partial analyses of \"{title}\" into one coherent analysis, \
             removing redundancy and keeping the required sections:\n\n{}",
            parts.len(),
            parts.join("\n\n---\n\n")
        );

        match self.chat.complete(&merge_system, &merge_user, &self.model).await {
            Ok((text, backend)) => banner(&backend, lang, false, &text),
            Err(e) => {
                warn!("analysis merge failed, concatenating parts: {e}");
                banner("local", lang, false, &parts.join("\n\n"))
            }
        }
    }
}

fn banner(backend: &str, lang: AnalysisLang, truncated: bool, body: &str) -> String {
    let lang_label = match lang {
        AnalysisLang::Uk => "uk",
        AnalysisLang::En => "en",
    };
    let truncation_note = if truncated { ", truncated" } else { "" };
    format!("[backend: {backend} | lang: {lang_label}{truncation_note}]\n\n{}", body.trim())
}

fn system_prompt(lang: AnalysisLang) -> String {
    format!(
        "You are a careful video transcript analyst. Produce a structured analysis with exactly \
         these sections: Idea, Key Points, Practical Takeaways, Uncertainties. {}",
        language_directive(lang)
    )
}

fn part_system_prompt(lang: AnalysisLang) -> String {
    format!(
        "You are summarizing one part of a longer video transcript. Capture the idea, key points, \
         and any practical takeaways from this part only; note uncertainties if present. {}",
        language_directive(lang)
    )
}

fn merge_system_prompt(lang: AnalysisLang) -> String {
    format!(
        "You merge partial transcript-part summaries into one coherent analysis with exactly these \
         sections: Idea, Key Points, Practical Takeaways, Uncertainties, removing duplication across \
         parts. {}",
        language_directive(lang)
    )
}

fn language_directive(lang: AnalysisLang) -> &'static str {
    match lang {
        AnalysisLang::Uk => "Respond in Ukrainian.",
        AnalysisLang::En => "Respond in English.",
    }
}

fn analysis_user_prompt(title: &str, transcript_text: &str) -> String {
    format!("Video title: {title}\n\nTranscript:\n{transcript_text}")
}

fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        (text.to_string(), false)
    } else {
        (text.chars().take(max_chars).collect(), true)
    }
}

/// Split into overlapping windows, preferring to cut at whitespace near the
/// target boundary rather than mid-word.
fn split_word_boundary_windows(text: &str, window_chars: usize, overlap_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let stride = window_chars.saturating_sub(overlap_chars).max(1);

    let mut windows = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let raw_end = (start + window_chars).min(chars.len());
        let end = if raw_end < chars.len() {
            nearest_whitespace_boundary(&chars, raw_end)
        } else {
            raw_end
        };
        windows.push(chars[start..end].iter().collect());
        if end >= chars.len() {
            break;
        }
        start += stride;
    }
    windows
}

fn nearest_whitespace_boundary(chars: &[char], pos: usize) -> usize {
    let search_back = pos.saturating_sub(200);
    for i in (search_back..pos).rev() {
        if chars[i].is_whitespace() {
            return i;
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::chat::LocalChatBackend;

    fn local_only_chain() -> std::sync::Arc<ChatChain> {
        std::sync::Arc::new(ChatChain::new(vec![Box::new(LocalChatBackend)]))
    }

    #[tokio::test]
    async fn single_call_path_for_short_transcript() {
        let engine = AnalysisEngine::new(local_only_chain(), "local-model", true);
        let result = engine.analyze("short transcript text", "Title", None).await;
        assert!(result.contains("backend: local"));
    }

    #[tokio::test]
    async fn map_reduce_path_for_long_local_transcript() {
        let engine = AnalysisEngine::new(local_only_chain(), "local-model", true);
        let long_text = "word ".repeat(5000);
        let result = engine.analyze(&long_text, "Title", None).await;
        assert!(!result.is_empty());
    }

    #[test]
    fn windowing_prefers_whitespace_cuts() {
        let text = "word ".repeat(3000);
        let windows = split_word_boundary_windows(&text, 1000, 100);
        assert!(windows.len() > 1);
        for w in &windows {
            assert!(!w.ends_with(|c: char| c.is_alphanumeric()) || w.chars().count() < 1000);
        }
    }
}
