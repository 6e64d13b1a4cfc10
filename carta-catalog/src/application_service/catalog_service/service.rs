use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::application_service::pipeline::{PluginChain, StageControl, StageFault};
use crate::domain::operation::{
    keys, CatalogRequest, CatalogResponse, CreateRequest, CreateResponse, DeleteRequest,
    DeleteResponse, OperationKind, PropertyValue, QueryRequest, QueryResponse, ResourceRequest,
    ResourceResponse, UpdateRequest, UpdateResponse,
};
use crate::port::resource_reader::{ResourceReadError, ResourceReader};
use crate::port::storage_backend::{StorageBackend, StorageFault, TransactionToken};

/// カタログオペレーションの失敗の分類。
///
/// - `Rejected` はステージの意図的な停止で、入力を直して再試行できる
/// - `Internal` / コミット系の `Storage` はオペレーション全体の中断
/// - `Fetch` はリトライ可能なリモート取得失敗
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("operation rejected: {reason}")]
    Rejected { reason: String },
    #[error(transparent)]
    Internal(#[from] StageFault),
    #[error(transparent)]
    Storage(#[from] StorageFault),
    #[error("resource fetch failed: {0}")]
    Fetch(String),
    #[error("operation timed out")]
    Timeout,
}

impl From<ResourceReadError> for CatalogError {
    fn from(error: ResourceReadError) -> Self {
        match error {
            ResourceReadError::Fetch(message) => CatalogError::Fetch(message),
            ResourceReadError::UnknownSource(source) => {
                CatalogError::Fetch(format!("unknown source: {source}"))
            }
            ResourceReadError::Timeout => CatalogError::Timeout,
        }
    }
}

/// カタログパイプラインのオーケストレーター。
///
/// オペレーションごとに プリチェーン → バックエンド（または連合取得）→
/// ポストチェーン を実行する。ステージ・バックエンド・リーダーはすべて
/// 構築時に注入され、実行時のサービス検索は行わない。
///
/// バックエンドとキャッシュは共有シングルトンだが、1 回のパイプライン
/// 実行内に共有可変状態はなく、ステージ走査は逐次となる。
pub struct CatalogService<B, R> {
    backend: Arc<B>,
    resource_reader: Arc<R>,
    chain: PluginChain,
}

impl<B, R> CatalogService<B, R>
where
    B: StorageBackend,
    R: ResourceReader,
{
    pub fn new(backend: Arc<B>, resource_reader: Arc<R>, chain: PluginChain) -> Self {
        Self {
            backend,
            resource_reader,
            chain,
        }
    }

    /// 取り込みオペレーション。
    ///
    /// ステージングは部分成功を許し、成功分のみがコミットされる。
    /// per-item fault はレスポンスに載せて返す。
    pub async fn create(
        &self,
        request: CreateRequest,
        deadline: Option<Duration>,
    ) -> Result<CreateResponse, CatalogError> {
        let request = match self.chain.run_pre(CatalogRequest::Create(request)).await? {
            StageControl::Continue(CatalogRequest::Create(request)) => request,
            StageControl::Continue(other) => {
                return Err(shape_fault(OperationKind::Create, other.kind()))
            }
            StageControl::Stop { reason } => return Err(CatalogError::Rejected { reason }),
        };

        let CreateRequest { items, properties } = request;
        let txn = TransactionToken::new();

        let outcome = match with_deadline(deadline, self.backend.create(&txn, items)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.abort(&txn).await;
                return Err(e);
            }
        };

        if let Err(e) = with_deadline(deadline, self.backend.commit(&txn)).await {
            self.abort(&txn).await;
            return Err(e);
        }

        let response = CatalogResponse::Create(CreateResponse {
            created: outcome.items,
            faults: outcome.faults,
            properties,
        });
        match self.run_post(response).await? {
            CatalogResponse::Create(response) => Ok(response),
            other => Err(shape_fault(OperationKind::Create, other.kind())),
        }
    }

    /// 更新オペレーション（同一 ID に対する全置換）。
    pub async fn update(
        &self,
        request: UpdateRequest,
        deadline: Option<Duration>,
    ) -> Result<UpdateResponse, CatalogError> {
        let request = match self.chain.run_pre(CatalogRequest::Update(request)).await? {
            StageControl::Continue(CatalogRequest::Update(request)) => request,
            StageControl::Continue(other) => {
                return Err(shape_fault(OperationKind::Update, other.kind()))
            }
            StageControl::Stop { reason } => return Err(CatalogError::Rejected { reason }),
        };

        let UpdateRequest { items, properties } = request;
        let txn = TransactionToken::new();

        let outcome = match with_deadline(deadline, self.backend.update(&txn, items)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.abort(&txn).await;
                return Err(e);
            }
        };

        if let Err(e) = with_deadline(deadline, self.backend.commit(&txn)).await {
            self.abort(&txn).await;
            return Err(e);
        }

        let response = CatalogResponse::Update(UpdateResponse {
            updated: outcome.items,
            faults: outcome.faults,
            properties,
        });
        match self.run_post(response).await? {
            CatalogResponse::Update(response) => Ok(response),
            other => Err(shape_fault(OperationKind::Update, other.kind())),
        }
    }

    /// 削除オペレーション。
    pub async fn delete(
        &self,
        request: DeleteRequest,
        deadline: Option<Duration>,
    ) -> Result<DeleteResponse, CatalogError> {
        let request = match self.chain.run_pre(CatalogRequest::Delete(request)).await? {
            StageControl::Continue(CatalogRequest::Delete(request)) => request,
            StageControl::Continue(other) => {
                return Err(shape_fault(OperationKind::Delete, other.kind()))
            }
            StageControl::Stop { reason } => return Err(CatalogError::Rejected { reason }),
        };

        let DeleteRequest { ids, properties } = request;
        let txn = TransactionToken::new();

        let outcome = match with_deadline(deadline, self.backend.delete(&txn, ids)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.abort(&txn).await;
                return Err(e);
            }
        };

        if let Err(e) = with_deadline(deadline, self.backend.commit(&txn)).await {
            self.abort(&txn).await;
            return Err(e);
        }

        let response = CatalogResponse::Delete(DeleteResponse {
            deleted: outcome.items,
            faults: outcome.faults,
            properties,
        });
        match self.run_post(response).await? {
            CatalogResponse::Delete(response) => Ok(response),
            other => Err(shape_fault(OperationKind::Delete, other.kind())),
        }
    }

    /// 検索オペレーション。永続化済みの状態のみを対象とする。
    pub async fn query(
        &self,
        request: QueryRequest,
        deadline: Option<Duration>,
    ) -> Result<QueryResponse, CatalogError> {
        let request = match self.chain.run_pre(CatalogRequest::Query(request)).await? {
            StageControl::Continue(CatalogRequest::Query(request)) => request,
            StageControl::Continue(other) => {
                return Err(shape_fault(OperationKind::Query, other.kind()))
            }
            StageControl::Stop { reason } => return Err(CatalogError::Rejected { reason }),
        };

        let QueryRequest {
            expression,
            properties,
        } = request;

        let hits = with_deadline(deadline, self.backend.query(&expression)).await?;

        let response = CatalogResponse::Query(QueryResponse { hits, properties });
        match self.run_post(response).await? {
            CatalogResponse::Query(response) => Ok(response),
            other => Err(shape_fault(OperationKind::Query, other.kind())),
        }
    }

    /// リソース取得オペレーション。
    ///
    /// キャッシュの参照はリーダー実装側の責務で、ここでは結果の
    /// サイズヒントをプロパティバッグに記録するところまでを行う。
    pub async fn retrieve_resource(
        &self,
        request: ResourceRequest,
        deadline: Option<Duration>,
    ) -> Result<ResourceResponse, CatalogError> {
        let request = match self.chain.run_pre(CatalogRequest::Resource(request)).await? {
            StageControl::Continue(CatalogRequest::Resource(request)) => request,
            StageControl::Continue(other) => {
                return Err(shape_fault(OperationKind::Resource, other.kind()))
            }
            StageControl::Stop { reason } => return Err(CatalogError::Rejected { reason }),
        };

        let ResourceRequest {
            metacard,
            uri,
            mut properties,
        } = request;

        // CacheKey 導出用のソース ID はバッグ優先、無ければ metacard から
        let source_id = properties
            .get_text(keys::SOURCE_ID)
            .unwrap_or_else(|| metacard.source_id())
            .to_string();

        let retrieved = with_deadline(
            deadline,
            self.resource_reader.retrieve(&uri, &metacard, &source_id),
        )
        .await?;

        properties.insert(
            keys::RESOURCE_SIZE,
            PropertyValue::Integer(retrieved.payload.len() as i64),
        );

        let response = CatalogResponse::Resource(ResourceResponse {
            payload: retrieved.payload,
            mime_type: retrieved.mime_type,
            from_cache: retrieved.from_cache,
            properties,
        });
        match self.run_post(response).await? {
            CatalogResponse::Resource(response) => Ok(response),
            other => Err(shape_fault(OperationKind::Resource, other.kind())),
        }
    }

    async fn run_post(&self, response: CatalogResponse) -> Result<CatalogResponse, CatalogError> {
        match self.chain.run_post(response).await? {
            StageControl::Continue(response) => Ok(response),
            StageControl::Stop { reason } => Err(CatalogError::Rejected { reason }),
        }
    }

    /// 失敗経路での明示的なトランザクション破棄。
    ///
    /// ロールバック自体の失敗は警告ログに残し、呼び出し元には元の失敗を返す。
    async fn abort(&self, txn: &TransactionToken) {
        if let Err(e) = self.backend.rollback(txn).await {
            tracing::warn!(txn = %txn, error = %e, "rollback after failure also failed");
        }
    }
}

/// ステージが variant（構造的な形）を入れ替えた場合の内部エラー。
fn shape_fault(expected: OperationKind, actual: OperationKind) -> CatalogError {
    CatalogError::Internal(StageFault {
        stage: "pipeline".to_string(),
        message: format!("stage returned a {actual} payload for a {expected} operation"),
    })
}

/// 呼び出し元のデッドラインをバックエンド／リーダー呼び出しに適用する。
async fn with_deadline<T, E, F>(deadline: Option<Duration>, fut: F) -> Result<T, CatalogError>
where
    F: Future<Output = Result<T, E>>,
    CatalogError: From<E>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(CatalogError::from),
            Err(_) => Err(CatalogError::Timeout),
        },
        None => fut.await.map_err(CatalogError::from),
    }
}
