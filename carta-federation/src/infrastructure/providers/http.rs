//! HTTP source provider (requires the `remote-connectivity` feature).

use crate::infrastructure::{FetchError, FetchResult, ResourcePayload, SourceProvider};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

pub struct HttpSourceProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSourceProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn resource_url(&self, locator: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            locator.trim_start_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl SourceProvider for HttpSourceProvider {
    async fn fetch(&self, locator: &str) -> FetchResult<ResourcePayload> {
        let url = self.resource_url(locator);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::new(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(FetchError::new(format!(
                "unexpected status {} from {url}",
                response.status()
            )));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::new(format!("reading body from {url} failed: {e}")))?;

        Ok(ResourcePayload {
            bytes: bytes.to_vec(),
            mime_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_url_joins_without_duplicate_slashes() {
        let provider = HttpSourceProvider::new("https://catalog.example.com/resources/");

        assert_eq!(
            provider.resource_url("/docs/doc-1"),
            "https://catalog.example.com/resources/docs/doc-1"
        );
        assert_eq!(
            provider.resource_url("docs/doc-1"),
            "https://catalog.example.com/resources/docs/doc-1"
        );
    }
}
