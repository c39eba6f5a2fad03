//! The sentinel provider: an always-available deterministic stub.
//!
//! Used by tests and as the graceful-degradation target when the vision
//! circuit is open. It bypasses the administrative enablement map entirely.

use async_trait::async_trait;
use futures::stream;
use sha2::{Digest, Sha256};

use super::{
    ChatProvider, EmbeddingProvider, FileAnalysisProvider, ImageGenProvider, ProviderMeta,
    SpeechToTextProvider, TextToSpeechProvider, VideoGenProvider, VisionProvider, SENTINEL_NAME,
};
use crate::capability::Capability;
use crate::types::{
    AnalysisOutcome, CallOptions, ChatOutcome, ImageSource, MediaArtifact, MediaOutcome, Message,
    SpeechOutcome, StreamEvent, TranscriptOutcome, UsageInfo, VisionOutcome,
};
use crate::{BoxStream, Result};

/// The single model name the sentinel reports for every capability.
pub const SENTINEL_MODEL: &str = "sentinel-static";

/// Deterministic stub provider implementing every capability.
#[derive(Debug, Clone)]
pub struct SentinelProvider {
    dimension: usize,
}

impl Default for SentinelProvider {
    fn default() -> Self {
        Self { dimension: 768 }
    }
}

impl SentinelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-default embedding dimension (tests exercising small vectors).
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Deterministic unit-norm pseudo-embedding seeded from a sha256 of the
    /// text. Equal texts map to equal vectors, so ranking tests are exact.
    fn pseudo_embedding(&self, text: &str) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dimension);
        let mut counter: u32 = 0;
        while out.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for pair in digest.chunks_exact(2) {
                if out.len() == self.dimension {
                    break;
                }
                let raw = u16::from_le_bytes([pair[0], pair[1]]);
                // Map to [-1, 1].
                out.push(raw as f32 / (u16::MAX as f32 / 2.0) - 1.0);
            }
            counter += 1;
        }
        let norm = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut out {
                *x /= norm;
            }
        }
        out
    }

    fn canned_reply(messages: &[Message]) -> String {
        let last = messages
            .iter()
            .rev()
            .map(|m| m.text())
            .find(|t| !t.is_empty())
            .unwrap_or_default();
        format!("[sentinel] echo: {}", last)
    }
}

impl ProviderMeta for SentinelProvider {
    fn name(&self) -> &str {
        SENTINEL_NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn default_model(&self, _capability: Capability) -> Option<&str> {
        Some(SENTINEL_MODEL)
    }
}

#[async_trait]
impl ChatProvider for SentinelProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        _options: &CallOptions,
    ) -> Result<ChatOutcome> {
        Ok(ChatOutcome {
            content: Self::canned_reply(messages),
            provider: SENTINEL_NAME.to_string(),
            model: model.to_string(),
            usage: Some(UsageInfo::default()),
        })
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        _model: &str,
        _options: &CallOptions,
    ) -> Result<BoxStream<'static, StreamEvent>> {
        // Word-by-word deltas followed by a terminal frame.
        let reply = Self::canned_reply(messages);
        let mut events: Vec<Result<StreamEvent>> = reply
            .split_inclusive(' ')
            .map(|w| {
                Ok(StreamEvent::ContentDelta {
                    content: w.to_string(),
                })
            })
            .collect();
        events.push(Ok(StreamEvent::StreamEnd {
            finish_reason: Some("stop".to_string()),
        }));
        Ok(Box::pin(stream::iter(events)))
    }
}

#[async_trait]
impl EmbeddingProvider for SentinelProvider {
    async fn embed_batch(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.pseudo_embedding(t)).collect())
    }
}

#[async_trait]
impl VisionProvider for SentinelProvider {
    async fn analyze_image(
        &self,
        _image: &ImageSource,
        prompt: &str,
        model: &str,
    ) -> Result<VisionOutcome> {
        Ok(VisionOutcome {
            content: format!("[sentinel] image analysis unavailable; prompt was: {}", prompt),
            provider: SENTINEL_NAME.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ImageGenProvider for SentinelProvider {
    async fn generate_image(
        &self,
        _prompt: &str,
        model: &str,
        _options: &CallOptions,
    ) -> Result<MediaOutcome> {
        // 1x1 transparent PNG.
        Ok(MediaOutcome {
            artifact: MediaArtifact::Base64 {
                data: "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==".to_string(),
                media_type: "image/png".to_string(),
            },
            provider: SENTINEL_NAME.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl VideoGenProvider for SentinelProvider {
    async fn generate_video(
        &self,
        _prompt: &str,
        model: &str,
        _options: &CallOptions,
    ) -> Result<MediaOutcome> {
        Ok(MediaOutcome {
            artifact: MediaArtifact::Url {
                url: "about:blank".to_string(),
            },
            provider: SENTINEL_NAME.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl SpeechToTextProvider for SentinelProvider {
    async fn transcribe(
        &self,
        audio: &[u8],
        _media_type: &str,
        model: &str,
        _options: &CallOptions,
    ) -> Result<TranscriptOutcome> {
        Ok(TranscriptOutcome {
            text: format!("[sentinel] transcription of {} bytes", audio.len()),
            language: None,
            provider: SENTINEL_NAME.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl TextToSpeechProvider for SentinelProvider {
    async fn synthesize(
        &self,
        _text: &str,
        model: &str,
        _options: &CallOptions,
    ) -> Result<SpeechOutcome> {
        Ok(SpeechOutcome {
            audio: String::new(),
            media_type: "audio/wav".to_string(),
            provider: SENTINEL_NAME.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl FileAnalysisProvider for SentinelProvider {
    async fn analyze_file(
        &self,
        file_name: &str,
        _content: &[u8],
        prompt: &str,
        model: &str,
    ) -> Result<AnalysisOutcome> {
        Ok(AnalysisOutcome {
            content: format!("[sentinel] analysis of '{}': {}", file_name, prompt),
            provider: SENTINEL_NAME.to_string(),
            model: model.to_string(),
        })
    }
}
