//! Normalized results returned by the facade.
//!
//! Every provider call shape collapses into one of these, so callers never
//! see vendor response bodies.

use serde::{Deserialize, Serialize};

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Result of a synchronous chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub content: String,
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
}

/// Metadata returned after a streaming chat completes. Content was already
/// delivered through the chunk callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOutcome {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
}

/// Result of an image-understanding call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionOutcome {
    pub content: String,
    pub provider: String,
    pub model: String,
}

/// A generated media artifact: either a URL the provider hosts, or inline
/// base64 bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaArtifact {
    Url { url: String },
    Base64 { data: String, media_type: String },
}

/// Result of image or video generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaOutcome {
    pub artifact: MediaArtifact,
    pub provider: String,
    pub model: String,
}

/// Result of speech-to-text transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptOutcome {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub provider: String,
    pub model: String,
}

/// Result of text-to-speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechOutcome {
    /// Base64-encoded audio bytes.
    pub audio: String,
    pub media_type: String,
    pub provider: String,
    pub model: String,
}

/// Result of file analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub content: String,
    pub provider: String,
    pub model: String,
}
