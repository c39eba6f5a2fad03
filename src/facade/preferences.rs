//! Per-user model configuration lookup.
//!
//! The platform keeps per-user provider/model defaults in its own storage;
//! the core only consumes them through this trait. [`StaticPreferences`] is
//! the in-memory reference implementation used by tests and standalone
//! deployments.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::capability::Purpose;
use crate::Result;

#[async_trait]
pub trait ModelPreferences: Send + Sync {
    /// The provider the user configured for a purpose, if any.
    async fn default_provider(&self, user_id: Option<&str>, purpose: Purpose)
        -> Result<Option<String>>;

    /// The model the user configured for a purpose, if any.
    async fn default_model(&self, purpose: Purpose, user_id: Option<&str>)
        -> Result<Option<String>>;
}

#[derive(Debug, Clone, Default)]
struct PurposeDefaults {
    provider: Option<String>,
    model: Option<String>,
}

/// Fixed in-memory preferences: global defaults plus per-user overrides.
#[derive(Debug, Clone, Default)]
pub struct StaticPreferences {
    global: HashMap<Purpose, PurposeDefaults>,
    per_user: HashMap<String, HashMap<Purpose, PurposeDefaults>>,
}

impl StaticPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(
        mut self,
        purpose: Purpose,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.global.insert(
            purpose,
            PurposeDefaults {
                provider: Some(provider.into().to_lowercase()),
                model: Some(model.into()),
            },
        );
        self
    }

    pub fn with_user_default(
        mut self,
        user_id: impl Into<String>,
        purpose: Purpose,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.per_user.entry(user_id.into()).or_default().insert(
            purpose,
            PurposeDefaults {
                provider: Some(provider.into().to_lowercase()),
                model: Some(model.into()),
            },
        );
        self
    }

    fn lookup(&self, user_id: Option<&str>, purpose: Purpose) -> Option<&PurposeDefaults> {
        if let Some(user) = user_id {
            if let Some(entry) = self.per_user.get(user).and_then(|m| m.get(&purpose)) {
                return Some(entry);
            }
        }
        self.global.get(&purpose)
    }
}

#[async_trait]
impl ModelPreferences for StaticPreferences {
    async fn default_provider(
        &self,
        user_id: Option<&str>,
        purpose: Purpose,
    ) -> Result<Option<String>> {
        Ok(self
            .lookup(user_id, purpose)
            .and_then(|d| d.provider.clone()))
    }

    async fn default_model(
        &self,
        purpose: Purpose,
        user_id: Option<&str>,
    ) -> Result<Option<String>> {
        Ok(self.lookup(user_id, purpose).and_then(|d| d.model.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_user_override_beats_global_default() {
        let prefs = StaticPreferences::new()
            .with_default(Purpose::Chat, "ollama", "llama3.1")
            .with_user_default("u1", Purpose::Chat, "openai", "gpt-4o-mini");

        assert_eq!(
            prefs.default_provider(Some("u1"), Purpose::Chat).await.unwrap(),
            Some("openai".to_string())
        );
        assert_eq!(
            prefs.default_provider(Some("u2"), Purpose::Chat).await.unwrap(),
            Some("ollama".to_string())
        );
        assert_eq!(
            prefs.default_model(Purpose::Chat, None).await.unwrap(),
            Some("llama3.1".to_string())
        );
    }

    #[tokio::test]
    async fn test_unconfigured_purpose_is_none() {
        let prefs = StaticPreferences::new();
        assert_eq!(
            prefs.default_provider(None, Purpose::Vectorize).await.unwrap(),
            None
        );
    }
}
