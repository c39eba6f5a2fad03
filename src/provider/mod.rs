//! Provider abstraction layer.
//!
//! One trait per capability, all object-safe, so the registry can hold
//! `Arc<dyn ChatProvider>` etc. and the same concrete provider can be
//! registered under every capability it implements. Providers are stateless
//! adapters: build a request, execute it, parse into a unified outcome.

pub mod ollama;
pub mod openai_like;
pub mod sentinel;

use async_trait::async_trait;
use keyring::Entry;
use serde::Serialize;
use std::env;
use std::time::Duration;

use crate::capability::Capability;
use crate::types::{
    AnalysisOutcome, CallOptions, ChatOutcome, ImageSource, MediaOutcome, Message, SpeechOutcome,
    StreamEvent, TranscriptOutcome, VisionOutcome,
};
use crate::{BoxStream, Result};

pub use ollama::OllamaProvider;
pub use openai_like::OpenAiCompatProvider;
pub use sentinel::{SentinelProvider, SENTINEL_MODEL};

/// Reserved name of the always-available stub provider.
pub const SENTINEL_NAME: &str = "sentinel";

/// Health snapshot used by operator-facing status reports.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Metadata every provider exposes regardless of capabilities.
pub trait ProviderMeta: Send + Sync {
    /// Lowercase provider identifier.
    fn name(&self) -> &str;

    /// Local readiness flag. `false` means "registered but not ready"
    /// (endpoint unreachable at composition, key missing, ...).
    fn is_available(&self) -> bool;

    /// Built-in default model for a capability, if the provider has one.
    fn default_model(&self, capability: Capability) -> Option<&str>;

    fn health(&self) -> ProviderHealth {
        ProviderHealth {
            name: self.name().to_string(),
            available: self.is_available(),
            detail: None,
        }
    }
}

#[async_trait]
pub trait ChatProvider: ProviderMeta {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        options: &CallOptions,
    ) -> Result<ChatOutcome>;

    /// Open a streaming chat. Events arrive in provider emission order.
    async fn chat_stream(
        &self,
        messages: &[Message],
        model: &str,
        options: &CallOptions,
    ) -> Result<BoxStream<'static, StreamEvent>>;
}

impl std::fmt::Debug for dyn ChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatProvider")
            .field("name", &self.name())
            .finish()
    }
}

#[async_trait]
pub trait EmbeddingProvider: ProviderMeta {
    /// Embed a batch of texts. The result must be index-aligned with the
    /// input; the facade rejects any count mismatch.
    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait VisionProvider: ProviderMeta {
    async fn analyze_image(
        &self,
        image: &ImageSource,
        prompt: &str,
        model: &str,
    ) -> Result<VisionOutcome>;
}

impl std::fmt::Debug for dyn VisionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionProvider")
            .field("name", &self.name())
            .finish()
    }
}

#[async_trait]
pub trait ImageGenProvider: ProviderMeta {
    async fn generate_image(
        &self,
        prompt: &str,
        model: &str,
        options: &CallOptions,
    ) -> Result<MediaOutcome>;
}

#[async_trait]
pub trait VideoGenProvider: ProviderMeta {
    async fn generate_video(
        &self,
        prompt: &str,
        model: &str,
        options: &CallOptions,
    ) -> Result<MediaOutcome>;
}

#[async_trait]
pub trait SpeechToTextProvider: ProviderMeta {
    async fn transcribe(
        &self,
        audio: &[u8],
        media_type: &str,
        model: &str,
        options: &CallOptions,
    ) -> Result<TranscriptOutcome>;
}

#[async_trait]
pub trait TextToSpeechProvider: ProviderMeta {
    async fn synthesize(
        &self,
        text: &str,
        model: &str,
        options: &CallOptions,
    ) -> Result<SpeechOutcome>;
}

#[async_trait]
pub trait FileAnalysisProvider: ProviderMeta {
    async fn analyze_file(
        &self,
        file_name: &str,
        content: &[u8],
        prompt: &str,
        model: &str,
    ) -> Result<AnalysisOutcome>;
}

/// Build the pooled HTTP client the wire providers share.
///
/// Timeout and pool sizing are env-overridable so operators can tune them
/// without a rebuild.
pub(crate) fn build_http_client() -> Result<reqwest::Client> {
    let timeout_secs = env::var("AI_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(120);

    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .pool_max_idle_per_host(
            env::var("AI_HTTP_POOL_MAX_IDLE_PER_HOST")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(32),
        )
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .build()
        .map_err(crate::Error::Transport)
}

/// Resolve an API key for a provider: OS keyring first, then
/// `<PROVIDER>_API_KEY` from the environment.
pub(crate) fn resolve_api_key(provider_id: &str) -> Option<String> {
    if let Ok(entry) = Entry::new("ai-hub", provider_id) {
        if let Ok(key) = entry.get_password() {
            return Some(key);
        }
    }
    let env_var = format!(
        "{}_API_KEY",
        provider_id.to_uppercase().replace(['-', '.'], "_")
    );
    env::var(env_var).ok()
}
