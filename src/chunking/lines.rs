//! Line-based sliding-window chunker (C4) with a content hash.
//!
//! Grounded on `chunking::temporal::TemporalChunker`'s fixed-window shape,
//! generalized to the line/overlap windowing and `content_hash` spec.md
//! §4.4 requires instead of a fixed-duration window.

use crate::store::StoredChunk;
use crate::transcription::Transcript;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Sliding-window chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct LineChunkConfig {
    /// Lines per chunk, clamped to a minimum of 4.
    pub per_chunk: usize,
    /// Overlap between consecutive chunks, clamped to a minimum of 0 and
    /// below `per_chunk`.
    pub overlap: usize,
}

impl Default for LineChunkConfig {
    fn default() -> Self {
        Self { per_chunk: 8, overlap: 2 }
    }
}

impl LineChunkConfig {
    fn normalized(&self) -> (usize, usize) {
        let per_chunk = self.per_chunk.max(4);
        let overlap = self.overlap.min(per_chunk.saturating_sub(1));
        (per_chunk, overlap)
    }
}

/// Split a transcript's segments into overlapping windows and compute the
/// content hash over the resulting chunk set.
pub fn chunk_transcript(transcript: &Transcript, config: &LineChunkConfig) -> (Vec<StoredChunk>, String) {
    let (per_chunk, overlap) = config.normalized();
    let stride = per_chunk - overlap;
    let lines = &transcript.segments;

    let mut chunks = Vec::new();
    let mut idx = 0i64;
    let mut start = 0usize;
    while start < lines.len() {
        let end = (start + per_chunk).min(lines.len());
        let window = &lines[start..end];
        if window.is_empty() {
            break;
        }
        let start_ts = window.first().map(|l| l.start_seconds).unwrap_or(0.0);
        let end_ts = window
            .last()
            .map(|l| l.end_seconds.max(start_ts))
            .unwrap_or(start_ts);
        let text = window
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        chunks.push(StoredChunk { idx, start_ts, end_ts, text });
        idx += 1;

        if end == lines.len() {
            break;
        }
        start += stride;
    }

    let content_hash = content_hash(&chunks);
    (chunks, content_hash)
}

#[derive(Serialize)]
struct CanonicalChunk<'a> {
    idx: i64,
    start_ts: f64,
    end_ts: f64,
    text: &'a str,
}

/// SHA-256 of the canonical JSON of the chunk set (spec.md §4.4).
pub fn content_hash(chunks: &[StoredChunk]) -> String {
    let canonical: Vec<CanonicalChunk> = chunks
        .iter()
        .map(|c| CanonicalChunk {
            idx: c.idx,
            start_ts: c.start_ts,
            end_ts: c.end_ts,
            text: &c.text,
        })
        .collect();
    let json = serde_json::to_string(&canonical).unwrap_or_default();
    let digest = Sha256::digest(json.as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::TranscriptSegment;

    fn sample_transcript(n: usize) -> Transcript {
        let segments: Vec<TranscriptSegment> = (0..n)
            .map(|i| TranscriptSegment::new(i as f64 * 2.0, i as f64 * 2.0 + 2.0, format!("line {i}")))
            .collect();
        Transcript::new("v1".to_string(), segments)
    }

    #[test]
    fn stride_produces_contiguous_overlapping_windows() {
        let transcript = sample_transcript(20);
        let (chunks, _hash) = chunk_transcript(&transcript, &LineChunkConfig { per_chunk: 8, overlap: 2 });
        assert!(chunks.len() >= 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.idx, i as i64);
        }
        assert!(chunks.last().unwrap().end_ts >= chunks.last().unwrap().start_ts);
    }

    #[test]
    fn content_hash_is_stable_for_identical_inputs() {
        let transcript = sample_transcript(10);
        let (a, hash_a) = chunk_transcript(&transcript, &LineChunkConfig::default());
        let (_b, hash_b) = chunk_transcript(&transcript, &LineChunkConfig::default());
        assert_eq!(hash_a, hash_b);
        assert_eq!(a.len() > 0, true);
    }

    #[test]
    fn content_hash_changes_when_text_changes() {
        let t1 = sample_transcript(10);
        let mut t2 = t1.clone();
        t2.segments[0].text = "different".to_string();
        let (_, hash1) = chunk_transcript(&t1, &LineChunkConfig::default());
        let (_, hash2) = chunk_transcript(&t2, &LineChunkConfig::default());
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn overlap_is_clamped_below_per_chunk() {
        let config = LineChunkConfig { per_chunk: 4, overlap: 10 };
        let (per_chunk, overlap) = config.normalized();
        assert_eq!(per_chunk, 4);
        assert!(overlap < per_chunk);
    }
}
