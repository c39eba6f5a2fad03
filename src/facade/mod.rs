//! Single entry point over heterogeneous provider call shapes.
//!
//! The facade resolves a provider (per-call override → user preference →
//! registry default), resolves a model the same way, and wraps every
//! downstream call in the per-provider circuit breaker under the service
//! name `ai_provider_<name>`. Results are normalized into the outcome
//! structs; vendor response bodies never leave this layer.
//!
//! One deliberate asymmetry: `analyze_image` falls back to the sentinel
//! provider while its circuit is open; every other operation fails loudly.

pub mod preferences;

use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::capability::{Capability, Purpose};
use crate::provider::{ProviderMeta, SENTINEL_MODEL, SENTINEL_NAME};
use crate::registry::{ProviderRegistry, ProviderReport};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};
use crate::types::{
    AnalysisOutcome, CallOptions, ChatOutcome, ImageSource, MediaOutcome, Message, SpeechOutcome,
    StreamEvent, StreamOutcome, TranscriptOutcome, VisionOutcome,
};
use crate::{Error, Result};

pub use preferences::{ModelPreferences, StaticPreferences};

/// Chat input: a full conversation or a bare prompt (wrapped as a single
/// user turn).
pub enum ChatInput {
    Messages(Vec<Message>),
    Prompt(String),
}

impl ChatInput {
    fn into_messages(self) -> Result<Vec<Message>> {
        let messages = match self {
            ChatInput::Messages(m) => m,
            ChatInput::Prompt(p) => vec![Message::user(p)],
        };
        if messages.is_empty() {
            return Err(Error::invalid_input("chat requires at least one message"));
        }
        Ok(messages)
    }
}

impl From<Vec<Message>> for ChatInput {
    fn from(messages: Vec<Message>) -> Self {
        ChatInput::Messages(messages)
    }
}

impl From<&str> for ChatInput {
    fn from(prompt: &str) -> Self {
        ChatInput::Prompt(prompt.to_string())
    }
}

impl From<String> for ChatInput {
    fn from(prompt: String) -> Self {
        ChatInput::Prompt(prompt)
    }
}

pub struct AiFacade {
    registry: Arc<ProviderRegistry>,
    preferences: Arc<dyn ModelPreferences>,
    breaker: CircuitBreaker,
}

pub struct AiFacadeBuilder {
    registry: Option<Arc<ProviderRegistry>>,
    preferences: Option<Arc<dyn ModelPreferences>>,
    breaker_config: CircuitBreakerConfig,
}

impl AiFacadeBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            preferences: None,
            breaker_config: CircuitBreakerConfig::default(),
        }
    }

    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn preferences(mut self, preferences: Arc<dyn ModelPreferences>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    pub fn build(self) -> Result<AiFacade> {
        let registry = self
            .registry
            .ok_or_else(|| Error::configuration("facade requires a provider registry"))?;
        Ok(AiFacade {
            registry,
            preferences: self
                .preferences
                .unwrap_or_else(|| Arc::new(StaticPreferences::new())),
            breaker: CircuitBreaker::new(self.breaker_config),
        })
    }
}

impl Default for AiFacadeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn service_name(provider: &str) -> String {
    format!("ai_provider_{}", provider)
}

/// Wrap a raw failure with provider/operation context. Errors that already
/// carry provider context pass through unchanged so diagnostics like "model
/// not installed" survive intact.
fn wrap_provider_err(err: Error, provider: &str, operation: &'static str) -> Error {
    if err.provider().is_some() {
        return err;
    }
    match err {
        e @ (Error::CircuitOpen { .. } | Error::Configuration(_) | Error::InvalidInput(_)) => e,
        other => Error::provider_failure(provider, operation, other),
    }
}

impl AiFacade {
    pub fn builder() -> AiFacadeBuilder {
        AiFacadeBuilder::new()
    }

    /// Provider name for a call: per-call override → user preference →
    /// `None` (registry default).
    async fn pick_provider(
        &self,
        options: &CallOptions,
        user: Option<&str>,
        purpose: Purpose,
    ) -> Result<Option<String>> {
        if let Some(name) = &options.provider {
            return Ok(Some(name.to_lowercase()));
        }
        self.preferences.default_provider(user, purpose).await
    }

    /// Model for a call: per-call override → user preference → provider
    /// built-in default.
    async fn pick_model(
        &self,
        options: &CallOptions,
        user: Option<&str>,
        purpose: Purpose,
        provider: &dyn ProviderMeta,
    ) -> Result<String> {
        if let Some(model) = &options.model {
            return Ok(model.clone());
        }
        if let Some(model) = self.preferences.default_model(purpose, user).await? {
            return Ok(model);
        }
        provider
            .default_model(purpose.capability())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no model configured for {} on provider '{}'",
                    purpose,
                    provider.name()
                ))
            })
    }

    pub async fn chat(
        &self,
        input: impl Into<ChatInput>,
        user: Option<&str>,
        options: CallOptions,
    ) -> Result<ChatOutcome> {
        let messages = input.into().into_messages()?;
        let name = self.pick_provider(&options, user, Purpose::Chat).await?;
        let provider = self.registry.resolve_chat(name.as_deref()).await?;
        let model = self
            .pick_model(&options, user, Purpose::Chat, provider.as_ref())
            .await?;
        let service = service_name(provider.name());
        debug!(provider = provider.name(), %model, "chat");

        self.breaker
            .execute(&service, || async {
                provider
                    .chat(&messages, &model, &options)
                    .await
                    .map_err(|e| wrap_provider_err(e, provider.name(), "chat"))
            })
            .await
    }

    /// Streaming chat. `on_chunk` runs inline on the calling task for every
    /// content delta, strictly in provider emission order, before this
    /// returns; the return value carries metadata only.
    pub async fn chat_stream<F>(
        &self,
        input: impl Into<ChatInput>,
        mut on_chunk: F,
        user: Option<&str>,
        options: CallOptions,
    ) -> Result<StreamOutcome>
    where
        F: FnMut(&str),
    {
        let messages = input.into().into_messages()?;
        let name = self.pick_provider(&options, user, Purpose::Chat).await?;
        let provider = self.registry.resolve_chat(name.as_deref()).await?;
        let model = self
            .pick_model(&options, user, Purpose::Chat, provider.as_ref())
            .await?;
        let service = service_name(provider.name());

        let on_chunk = &mut on_chunk;
        self.breaker
            .execute(&service, || async {
                let mut stream = provider
                    .chat_stream(&messages, &model, &options)
                    .await
                    .map_err(|e| wrap_provider_err(e, provider.name(), "chat_stream"))?;

                let mut usage = None;
                while let Some(event) = stream.next().await {
                    match event
                        .map_err(|e| wrap_provider_err(e, provider.name(), "chat_stream"))?
                    {
                        StreamEvent::ContentDelta { content } => on_chunk(&content),
                        StreamEvent::Metadata { usage: u, .. } => usage = u.or(usage),
                        StreamEvent::StreamEnd { .. } => break,
                    }
                }
                Ok(StreamOutcome {
                    provider: provider.name().to_string(),
                    model: model.clone(),
                    usage,
                })
            })
            .await
    }

    pub async fn embed(
        &self,
        text: impl Into<String>,
        user: Option<&str>,
        options: CallOptions,
    ) -> Result<Vec<f32>> {
        let mut vectors = self
            .embed_texts(vec![text.into()], user, &options)
            .await?;
        Ok(vectors.pop().unwrap_or_default())
    }

    /// Embed a batch; the result is index-aligned with the input.
    pub async fn embed_batch(
        &self,
        texts: Vec<String>,
        user: Option<&str>,
        provider: Option<&str>,
    ) -> Result<Vec<Vec<f32>>> {
        let options = match provider {
            Some(name) => CallOptions::new().with_provider(name),
            None => CallOptions::new(),
        };
        self.embed_texts(texts, user, &options).await
    }

    async fn embed_texts(
        &self,
        texts: Vec<String>,
        user: Option<&str>,
        options: &CallOptions,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let name = self.pick_provider(options, user, Purpose::Vectorize).await?;
        let provider = self.registry.resolve_embedding(name.as_deref()).await?;
        let model = self
            .pick_model(options, user, Purpose::Vectorize, provider.as_ref())
            .await?;
        let service = service_name(provider.name());
        let expected = texts.len();

        let vectors = self
            .breaker
            .execute(&service, || async {
                provider
                    .embed_batch(&texts, &model)
                    .await
                    .map_err(|e| wrap_provider_err(e, provider.name(), "embed"))
            })
            .await?;

        if vectors.len() != expected {
            return Err(Error::provider_failure(
                provider.name(),
                "embed",
                anyhow::anyhow!(
                    "expected {} embeddings, provider returned {}",
                    expected,
                    vectors.len()
                ),
            ));
        }
        Ok(vectors)
    }

    /// Image understanding. Uniquely among the facade operations this
    /// degrades to the sentinel provider while the resolved provider's
    /// circuit is open, favoring availability over strictness.
    pub async fn analyze_image(
        &self,
        image_path: impl AsRef<Path>,
        prompt: &str,
        user: Option<&str>,
    ) -> Result<VisionOutcome> {
        let image = ImageSource::from_file(image_path)?;
        let options = CallOptions::new();
        let name = self.pick_provider(&options, user, Purpose::Pic2Text).await?;
        let provider = self.registry.resolve_vision(name.as_deref()).await?;
        let model = self
            .pick_model(&options, user, Purpose::Pic2Text, provider.as_ref())
            .await?;
        let service = service_name(provider.name());

        let registry = &self.registry;
        let image_ref = &image;
        self.breaker
            .execute_with_fallback(
                &service,
                || async {
                    provider
                        .analyze_image(image_ref, prompt, &model)
                        .await
                        .map_err(|e| wrap_provider_err(e, provider.name(), "analyze_image"))
                },
                || async {
                    warn!(
                        provider = provider.name(),
                        "vision circuit open, degrading to sentinel"
                    );
                    let sentinel = registry.resolve_vision(Some(SENTINEL_NAME)).await?;
                    let model = sentinel
                        .default_model(Capability::Vision)
                        .unwrap_or(SENTINEL_MODEL)
                        .to_string();
                    sentinel.analyze_image(image_ref, prompt, &model).await
                },
            )
            .await
    }

    pub async fn generate_image(
        &self,
        prompt: &str,
        user: Option<&str>,
        options: CallOptions,
    ) -> Result<MediaOutcome> {
        let name = self.pick_provider(&options, user, Purpose::Text2Pic).await?;
        let provider = self.registry.resolve_image_gen(name.as_deref()).await?;
        let model = self
            .pick_model(&options, user, Purpose::Text2Pic, provider.as_ref())
            .await?;
        let service = service_name(provider.name());
        self.breaker
            .execute(&service, || async {
                provider
                    .generate_image(prompt, &model, &options)
                    .await
                    .map_err(|e| wrap_provider_err(e, provider.name(), "generate_image"))
            })
            .await
    }

    pub async fn generate_video(
        &self,
        prompt: &str,
        user: Option<&str>,
        options: CallOptions,
    ) -> Result<MediaOutcome> {
        let name = self.pick_provider(&options, user, Purpose::Text2Vid).await?;
        let provider = self.registry.resolve_video_gen(name.as_deref()).await?;
        let model = self
            .pick_model(&options, user, Purpose::Text2Vid, provider.as_ref())
            .await?;
        let service = service_name(provider.name());
        self.breaker
            .execute(&service, || async {
                provider
                    .generate_video(prompt, &model, &options)
                    .await
                    .map_err(|e| wrap_provider_err(e, provider.name(), "generate_video"))
            })
            .await
    }

    pub async fn transcribe(
        &self,
        audio: &[u8],
        media_type: &str,
        user: Option<&str>,
        options: CallOptions,
    ) -> Result<TranscriptOutcome> {
        let name = self
            .pick_provider(&options, user, Purpose::Sound2Text)
            .await?;
        let provider = self
            .registry
            .resolve_speech_to_text(name.as_deref())
            .await?;
        let model = self
            .pick_model(&options, user, Purpose::Sound2Text, provider.as_ref())
            .await?;
        let service = service_name(provider.name());
        self.breaker
            .execute(&service, || async {
                provider
                    .transcribe(audio, media_type, &model, &options)
                    .await
                    .map_err(|e| wrap_provider_err(e, provider.name(), "transcribe"))
            })
            .await
    }

    pub async fn synthesize_speech(
        &self,
        text: &str,
        user: Option<&str>,
        options: CallOptions,
    ) -> Result<SpeechOutcome> {
        let name = self
            .pick_provider(&options, user, Purpose::Text2Sound)
            .await?;
        let provider = self
            .registry
            .resolve_text_to_speech(name.as_deref())
            .await?;
        let model = self
            .pick_model(&options, user, Purpose::Text2Sound, provider.as_ref())
            .await?;
        let service = service_name(provider.name());
        self.breaker
            .execute(&service, || async {
                provider
                    .synthesize(text, &model, &options)
                    .await
                    .map_err(|e| wrap_provider_err(e, provider.name(), "synthesize"))
            })
            .await
    }

    pub async fn analyze_file(
        &self,
        file_name: &str,
        content: &[u8],
        prompt: &str,
        user: Option<&str>,
        options: CallOptions,
    ) -> Result<AnalysisOutcome> {
        let name = self.pick_provider(&options, user, Purpose::Analyze).await?;
        let provider = self
            .registry
            .resolve_file_analysis(name.as_deref())
            .await?;
        let model = self
            .pick_model(&options, user, Purpose::Analyze, provider.as_ref())
            .await?;
        let service = service_name(provider.name());
        self.breaker
            .execute(&service, || async {
                provider
                    .analyze_file(file_name, content, prompt, &model)
                    .await
                    .map_err(|e| wrap_provider_err(e, provider.name(), "analyze_file"))
            })
            .await
    }

    /// Operator status: per-provider health and capability coverage.
    pub fn provider_health(&self) -> Vec<ProviderReport> {
        self.registry.health_report()
    }

    /// Circuit observability for a provider's service.
    pub fn circuit_snapshot(&self, provider: &str) -> Option<CircuitSnapshot> {
        self.breaker.snapshot(&service_name(provider))
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }
}
