//! carta-federation を使った ResourceReader 実装。
//!
//! `federation` feature が有効な場合のみコンパイルされる。
//! キャッシュ参照・フェッチ重複排除・ワーカープール制御はすべて
//! 連合側の [`ResourceDeliveryService`] に委譲する。

use std::sync::Arc;

use async_trait::async_trait;
use carta_federation::{DeliveryError, ResourceDeliveryService};

use crate::domain::metacard::Metacard;
use crate::port::resource_reader::{ResourceReadError, ResourceReader, RetrievedResource};

/// 連合配信サービスへのアダプタ。
pub struct FederationResourceReader {
    delivery: Arc<ResourceDeliveryService>,
}

impl FederationResourceReader {
    pub fn new(delivery: Arc<ResourceDeliveryService>) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl ResourceReader for FederationResourceReader {
    async fn retrieve(
        &self,
        uri: &str,
        metacard: &Metacard,
        source_id: &str,
    ) -> Result<RetrievedResource, ResourceReadError> {
        let delivered = self
            .delivery
            .retrieve(source_id, metacard.id(), uri, Some(metacard.modified()))
            .await
            .map_err(|e| match e {
                DeliveryError::UnknownSource(source) => ResourceReadError::UnknownSource(source),
                DeliveryError::Fetch(fetch) => ResourceReadError::Fetch(fetch.to_string()),
                DeliveryError::Timeout => ResourceReadError::Timeout,
            })?;

        Ok(RetrievedResource {
            payload: delivered.payload.bytes,
            mime_type: delivered.payload.mime_type,
            from_cache: delivered.from_cache,
        })
    }
}
