use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{FederationConfig, SourceProvider};

/// Registry of federated sources, keyed by source id.
pub struct SourceRegistry(RwLock<HashMap<String, Arc<dyn SourceProvider>>>);

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self(RwLock::new(HashMap::new()))
    }

    pub fn register(&self, source_id: impl Into<String>, provider: impl SourceProvider + 'static) {
        self.0.write().unwrap().insert(source_id.into(), Arc::new(provider));
    }

    pub fn resolve(&self, source_id: &str) -> Option<Arc<dyn SourceProvider>> {
        self.0.read().unwrap().get(source_id).cloned()
    }

    /// Initialize registry from configuration
    pub fn from_config(config: &FederationConfig) -> Self {
        let registry = Self::new();

        // Register configured HTTP sources
        #[cfg(feature = "remote-connectivity")]
        {
            use crate::infrastructure::providers::http::HttpSourceProvider;
            for source in &config.http_sources {
                registry.register(
                    source.id.clone(),
                    HttpSourceProvider::new(source.base_url.clone()),
                );
            }
        }
        #[cfg(not(feature = "remote-connectivity"))]
        if !config.http_sources.is_empty() {
            tracing::warn!(
                sources = config.http_sources.len(),
                "http sources configured but remote-connectivity is disabled"
            );
        }

        registry
    }
}
