//! Capability-based provider registry.
//!
//! Providers are registered explicitly at a composition root, one typed slot
//! per capability, in priority order (first registered = default candidate).
//! Resolution honors three gates: local registration, the provider's own
//! availability flag, and the administratively controlled enablement map.
//! The sentinel provider bypasses the enablement map entirely.

pub mod enablement;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::capability::Capability;
use crate::provider::{
    ChatProvider, EmbeddingProvider, FileAnalysisProvider, ImageGenProvider, ProviderHealth,
    ProviderMeta, SpeechToTextProvider, TextToSpeechProvider, VideoGenProvider, VisionProvider,
    SENTINEL_NAME,
};
use crate::{Error, Result};

pub use enablement::{EnablementCache, EnablementMap, EnablementSource, StaticEnablement};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("valid name regex"));

/// Per-provider entry in the operator health report.
#[derive(Debug, Clone)]
pub struct ProviderReport {
    pub health: ProviderHealth,
    pub capabilities: Vec<Capability>,
}

/// Immutable provider index built once by [`RegistryBuilder`].
pub struct ProviderRegistry {
    chat: Vec<Arc<dyn ChatProvider>>,
    embedding: Vec<Arc<dyn EmbeddingProvider>>,
    vision: Vec<Arc<dyn VisionProvider>>,
    image_gen: Vec<Arc<dyn ImageGenProvider>>,
    video_gen: Vec<Arc<dyn VideoGenProvider>>,
    speech_to_text: Vec<Arc<dyn SpeechToTextProvider>>,
    text_to_speech: Vec<Arc<dyn TextToSpeechProvider>>,
    file_analysis: Vec<Arc<dyn FileAnalysisProvider>>,
    /// Metadata view of every slot, for listings and health reports.
    meta: HashMap<Capability, Vec<Arc<dyn ProviderMeta>>>,
    default_provider: Option<String>,
    enablement: EnablementCache,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("default_provider", &self.default_provider)
            .finish_non_exhaustive()
    }
}

impl ProviderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub async fn resolve_chat(&self, name: Option<&str>) -> Result<Arc<dyn ChatProvider>> {
        self.resolve_in(&self.chat, Capability::Chat, name).await
    }

    pub async fn resolve_embedding(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingProvider>> {
        self.resolve_in(&self.embedding, Capability::Embedding, name)
            .await
    }

    pub async fn resolve_vision(&self, name: Option<&str>) -> Result<Arc<dyn VisionProvider>> {
        self.resolve_in(&self.vision, Capability::Vision, name).await
    }

    pub async fn resolve_image_gen(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn ImageGenProvider>> {
        self.resolve_in(&self.image_gen, Capability::ImageGeneration, name)
            .await
    }

    pub async fn resolve_video_gen(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn VideoGenProvider>> {
        self.resolve_in(&self.video_gen, Capability::VideoGeneration, name)
            .await
    }

    pub async fn resolve_speech_to_text(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn SpeechToTextProvider>> {
        self.resolve_in(&self.speech_to_text, Capability::SpeechToText, name)
            .await
    }

    pub async fn resolve_text_to_speech(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn TextToSpeechProvider>> {
        self.resolve_in(&self.text_to_speech, Capability::TextToSpeech, name)
            .await
    }

    pub async fn resolve_file_analysis(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn FileAnalysisProvider>> {
        self.resolve_in(&self.file_analysis, Capability::FileAnalysis, name)
            .await
    }

    /// Shared eligibility gate: registered → available → enabled.
    ///
    /// First call loads the enablement map and caches it permanently; an
    /// operator must call [`refresh_enablement`](Self::refresh_enablement)
    /// for later administrative changes to become visible.
    async fn resolve_in<P>(
        &self,
        slot: &[Arc<P>],
        capability: Capability,
        name: Option<&str>,
    ) -> Result<Arc<P>>
    where
        P: ProviderMeta + ?Sized,
    {
        let wanted = name
            .or(self.default_provider.as_deref())
            .map(str::to_lowercase)
            .or_else(|| slot.first().map(|p| p.name().to_lowercase()))
            .ok_or_else(|| Error::ProviderNotFound {
                name: "(default)".to_string(),
                capability,
                registered: vec![],
            })?;

        let found = slot.iter().find(|p| p.name().eq_ignore_ascii_case(&wanted));
        let provider = match found {
            Some(p) => p,
            None => {
                return Err(Error::ProviderNotFound {
                    name: wanted,
                    capability,
                    registered: slot.iter().map(|p| p.name().to_string()).collect(),
                })
            }
        };

        if !provider.is_available() {
            let available = slot
                .iter()
                .filter(|p| p.is_available() && !p.name().eq_ignore_ascii_case(&wanted))
                .map(|p| p.name().to_string())
                .collect();
            return Err(Error::ProviderUnavailable {
                name: wanted,
                capability,
                available,
            });
        }

        if !wanted.eq_ignore_ascii_case(SENTINEL_NAME) {
            let map = self.enablement.get().await?;
            if !map.grants(&wanted, capability) {
                return Err(Error::CapabilityDisabled {
                    name: wanted,
                    capability,
                });
            }
        }

        debug!(provider = %wanted, %capability, "resolved provider");
        Ok(provider.clone())
    }

    /// Names eligible for a capability, in registration order.
    pub async fn list_available(
        &self,
        capability: Capability,
        include_sentinel: bool,
        require_enabled: bool,
    ) -> Result<Vec<String>> {
        let slot = match self.meta.get(&capability) {
            Some(slot) => slot,
            None => return Ok(vec![]),
        };
        let map = if require_enabled {
            Some(self.enablement.get().await?)
        } else {
            None
        };
        let mut names = Vec::new();
        for provider in slot {
            let name = provider.name();
            if !provider.is_available() {
                continue;
            }
            let is_sentinel = name.eq_ignore_ascii_case(SENTINEL_NAME);
            if is_sentinel && !include_sentinel {
                continue;
            }
            if let Some(map) = &map {
                if !is_sentinel && !map.grants(name, capability) {
                    continue;
                }
            }
            names.push(name.to_string());
        }
        Ok(names)
    }

    /// Aggregate health and capability coverage per provider, in
    /// registration order.
    pub fn health_report(&self) -> Vec<ProviderReport> {
        let mut order: Vec<String> = Vec::new();
        let mut reports: HashMap<String, ProviderReport> = HashMap::new();
        for capability in Capability::ALL {
            let Some(slot) = self.meta.get(&capability) else {
                continue;
            };
            for provider in slot {
                let name = provider.name().to_string();
                let entry = reports.entry(name.clone()).or_insert_with(|| {
                    order.push(name);
                    ProviderReport {
                        health: provider.health(),
                        capabilities: vec![],
                    }
                });
                entry.capabilities.push(capability);
            }
        }
        order
            .into_iter()
            .filter_map(|name| reports.remove(&name))
            .collect()
    }

    /// Reload the enablement map from its source.
    pub async fn refresh_enablement(&self) -> Result<()> {
        self.enablement.refresh().await
    }

    /// Drop the cached enablement map; next eligibility check reloads it.
    pub fn invalidate_enablement(&self) {
        self.enablement.invalidate()
    }
}

/// Composition root for the registry.
///
/// Registration order is priority order. Each `register_*` call indexes the
/// provider under one capability; call several for multi-capability
/// providers.
#[derive(Default)]
pub struct RegistryBuilder {
    chat: Vec<Arc<dyn ChatProvider>>,
    embedding: Vec<Arc<dyn EmbeddingProvider>>,
    vision: Vec<Arc<dyn VisionProvider>>,
    image_gen: Vec<Arc<dyn ImageGenProvider>>,
    video_gen: Vec<Arc<dyn VideoGenProvider>>,
    speech_to_text: Vec<Arc<dyn SpeechToTextProvider>>,
    text_to_speech: Vec<Arc<dyn TextToSpeechProvider>>,
    file_analysis: Vec<Arc<dyn FileAnalysisProvider>>,
    meta: HashMap<Capability, Vec<Arc<dyn ProviderMeta>>>,
    default_provider: Option<String>,
    enablement: Option<Arc<dyn EnablementSource>>,
}

macro_rules! register_fn {
    ($fn_name:ident, $slot:ident, $trait_:ident, $capability:expr) => {
        pub fn $fn_name<P: $trait_ + 'static>(mut self, provider: Arc<P>) -> Self {
            self.meta
                .entry($capability)
                .or_default()
                .push(provider.clone());
            self.$slot.push(provider);
            self
        }
    };
}

impl RegistryBuilder {
    register_fn!(register_chat, chat, ChatProvider, Capability::Chat);
    register_fn!(
        register_embedding,
        embedding,
        EmbeddingProvider,
        Capability::Embedding
    );
    register_fn!(register_vision, vision, VisionProvider, Capability::Vision);
    register_fn!(
        register_image_gen,
        image_gen,
        ImageGenProvider,
        Capability::ImageGeneration
    );
    register_fn!(
        register_video_gen,
        video_gen,
        VideoGenProvider,
        Capability::VideoGeneration
    );
    register_fn!(
        register_speech_to_text,
        speech_to_text,
        SpeechToTextProvider,
        Capability::SpeechToText
    );
    register_fn!(
        register_text_to_speech,
        text_to_speech,
        TextToSpeechProvider,
        Capability::TextToSpeech
    );
    register_fn!(
        register_file_analysis,
        file_analysis,
        FileAnalysisProvider,
        Capability::FileAnalysis
    );

    /// Provider name used when a call specifies none.
    pub fn default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = Some(name.into().to_lowercase());
        self
    }

    pub fn enablement(mut self, source: Arc<dyn EnablementSource>) -> Self {
        self.enablement = Some(source);
        self
    }

    pub fn build(self) -> Result<ProviderRegistry> {
        for slot in self.meta.values() {
            for provider in slot {
                let name = provider.name();
                if !NAME_RE.is_match(name) {
                    return Err(Error::configuration(format!(
                        "invalid provider name '{}': must match {}",
                        name,
                        NAME_RE.as_str()
                    )));
                }
            }
        }
        let enablement = self.enablement.ok_or_else(|| {
            Error::configuration("registry requires an enablement source (use StaticEnablement::allow_all for open deployments)")
        })?;
        Ok(ProviderRegistry {
            chat: self.chat,
            embedding: self.embedding,
            vision: self.vision,
            image_gen: self.image_gen,
            video_gen: self.video_gen,
            speech_to_text: self.speech_to_text,
            text_to_speech: self.text_to_speech,
            file_analysis: self.file_analysis,
            meta: self.meta,
            default_provider: self.default_provider,
            enablement: EnablementCache::new(enablement),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SentinelProvider;

    fn sentinel_only() -> ProviderRegistry {
        let sentinel = Arc::new(SentinelProvider::new());
        ProviderRegistry::builder()
            .register_chat(sentinel.clone())
            .register_embedding(sentinel)
            .enablement(Arc::new(StaticEnablement::new(EnablementMap::default())))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sentinel_bypasses_empty_enablement() {
        let registry = sentinel_only();
        let provider = registry.resolve_chat(Some("sentinel")).await.unwrap();
        assert_eq!(provider.name(), "sentinel");
    }

    #[tokio::test]
    async fn test_unregistered_name_is_not_found() {
        let registry = sentinel_only();
        let err = registry.resolve_chat(Some("openai")).await.unwrap_err();
        assert!(matches!(err, Error::ProviderNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unknown_capability_lists_nothing() {
        let registry = sentinel_only();
        let names = registry
            .list_available(Capability::Vision, true, false)
            .await
            .unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_first_registered_is_fallback_default() {
        let registry = sentinel_only();
        let provider = registry.resolve_chat(None).await.unwrap();
        assert_eq!(provider.name(), "sentinel");
    }

    #[test]
    fn test_build_rejects_missing_enablement_source() {
        let sentinel = Arc::new(SentinelProvider::new());
        let err = ProviderRegistry::builder()
            .register_chat(sentinel)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_health_report_merges_capabilities() {
        let registry = sentinel_only();
        let report = registry.health_report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].health.name, "sentinel");
        assert_eq!(
            report[0].capabilities,
            vec![Capability::Chat, Capability::Embedding]
        );
    }
}
