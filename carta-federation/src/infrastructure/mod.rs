pub mod cache;
pub mod config;
pub mod delivery;
pub mod providers;
pub mod registry;

pub use config::{ConfigError, FederationConfig};

pub type FetchResult<T> = Result<T, FetchError>;

/// A remote fetch failed. Surfaced to callers as retryable.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Resource bytes as fetched from (or cached for) a source.
#[derive(Debug, Clone)]
pub struct ResourcePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// A federated source capable of resolving resource locators.
///
/// Query translation for specific wire protocols lives in external adapter
/// modules; this core only needs byte retrieval.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(&self, locator: &str) -> FetchResult<ResourcePayload>;
}
