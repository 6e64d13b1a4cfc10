pub mod infrastructure;

pub use infrastructure::{
    cache::{CacheKey, ResourceCacheManager},
    config::{ConfigError, DeliveryConfig, FederationConfig, HttpSourceConfig},
    delivery::{DeliveredResource, DeliveryError, ResourceDeliveryService},
    registry::SourceRegistry,
    FetchError, FetchResult, ResourcePayload, SourceProvider,
};

use std::sync::Arc;

/// Initialize a source registry from a configuration file
pub fn init_registry_from_file<P: AsRef<std::path::Path>>(
    config_path: P,
) -> Result<SourceRegistry, ConfigError> {
    let config = FederationConfig::from_file(config_path)?;
    Ok(SourceRegistry::from_config(&config))
}

/// Initialize a source registry from a configuration string
pub fn init_registry_from_str(config_str: &str) -> Result<SourceRegistry, ConfigError> {
    let config = FederationConfig::from_toml_str(config_str)?;
    Ok(SourceRegistry::from_config(&config))
}

/// Initialize a full delivery service (registry + cache) from a configuration file
pub fn init_delivery_from_file<P: AsRef<std::path::Path>>(
    config_path: P,
) -> Result<ResourceDeliveryService, ConfigError> {
    let config = FederationConfig::from_file(config_path)?;
    let registry = Arc::new(SourceRegistry::from_config(&config));
    let cache = Arc::new(ResourceCacheManager::new());
    Ok(ResourceDeliveryService::from_config(
        &config, registry, cache,
    ))
}

/// Initialize a delivery service with default configuration
pub fn init_delivery_default() -> ResourceDeliveryService {
    let config = FederationConfig::default();
    let registry = Arc::new(SourceRegistry::from_config(&config));
    let cache = Arc::new(ResourceCacheManager::new());
    ResourceDeliveryService::from_config(&config, registry, cache)
}
