//! Audio download and processing utilities, reused by the transcription
//! backends as the audio-STT fallback path (spec.md §4.3) when a video
//! carries no usable captions.

mod downloader;

pub use downloader::{download_audio, split_audio};
