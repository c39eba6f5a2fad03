//! Administrative capability enablement.
//!
//! Operators control which provider/capability pairs are usable through an
//! externally owned map (typically database-backed). The registry loads it
//! once and caches it for the process lifetime; capability changes are rare
//! operator actions, so freshness is traded for latency and the cache is
//! only refreshed explicitly.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::capability::Capability;
use crate::Result;

/// providerName (lowercase) → set of enabled capabilities.
#[derive(Debug, Clone, Default)]
pub struct EnablementMap {
    entries: HashMap<String, HashSet<Capability>>,
}

impl EnablementMap {
    /// Build from raw tag data, lowercasing names and dropping unknown tags.
    pub fn from_tags<N, T, I, J>(raw: I) -> Self
    where
        I: IntoIterator<Item = (N, J)>,
        J: IntoIterator<Item = T>,
        N: AsRef<str>,
        T: AsRef<str>,
    {
        let entries = raw
            .into_iter()
            .map(|(name, tags)| {
                let caps = tags
                    .into_iter()
                    .filter_map(|t| Capability::parse_tag(t.as_ref()))
                    .collect();
                (name.as_ref().to_lowercase(), caps)
            })
            .collect();
        Self { entries }
    }

    pub fn grant(&mut self, name: impl AsRef<str>, capability: Capability) {
        self.entries
            .entry(name.as_ref().to_lowercase())
            .or_default()
            .insert(capability);
    }

    /// Whether the map grants `capability` to `name`. Unknown providers are
    /// denied everything.
    pub fn grants(&self, name: &str, capability: Capability) -> bool {
        self.entries
            .get(&name.to_lowercase())
            .map(|caps| caps.contains(&capability))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where the enablement map comes from.
///
/// The platform's implementation reads administrative configuration from the
/// database; tests and standalone deployments use [`StaticEnablement`].
#[async_trait]
pub trait EnablementSource: Send + Sync {
    async fn load(&self) -> Result<EnablementMap>;
}

/// Fixed in-memory enablement source.
pub struct StaticEnablement {
    map: EnablementMap,
}

impl StaticEnablement {
    pub fn new(map: EnablementMap) -> Self {
        Self { map }
    }

    /// Grant every capability to every listed provider.
    pub fn allow_all<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let mut map = EnablementMap::default();
        for name in names {
            for cap in Capability::ALL {
                map.grant(name.as_ref(), cap);
            }
        }
        Self { map }
    }
}

#[async_trait]
impl EnablementSource for StaticEnablement {
    async fn load(&self) -> Result<EnablementMap> {
        Ok(self.map.clone())
    }
}

/// Process-wide cache over an [`EnablementSource`].
///
/// Populated lazily on first use, then held with no TTL. `refresh` reloads
/// in place; `invalidate` drops the cached map so the next lookup reloads.
pub struct EnablementCache {
    source: Arc<dyn EnablementSource>,
    cached: ArcSwapOption<EnablementMap>,
}

impl EnablementCache {
    pub fn new(source: Arc<dyn EnablementSource>) -> Self {
        Self {
            source,
            cached: ArcSwapOption::const_empty(),
        }
    }

    /// Current map, loading and caching it on first call.
    pub async fn get(&self) -> Result<Arc<EnablementMap>> {
        if let Some(map) = self.cached.load_full() {
            return Ok(map);
        }
        let loaded = Arc::new(self.source.load().await?);
        debug!("enablement map loaded and cached");
        // A concurrent first load may race us; last write wins, both maps
        // came from the same source.
        self.cached.store(Some(loaded.clone()));
        Ok(loaded)
    }

    /// Reload from the source, replacing the cached map.
    pub async fn refresh(&self) -> Result<()> {
        let loaded = Arc::new(self.source.load().await?);
        self.cached.store(Some(loaded));
        info!("enablement map refreshed");
        Ok(())
    }

    /// Drop the cached map; the next lookup reloads from the source.
    pub fn invalidate(&self) {
        self.cached.store(None);
        info!("enablement map invalidated");
    }
}
