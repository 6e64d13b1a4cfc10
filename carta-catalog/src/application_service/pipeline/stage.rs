use anyhow::Result;
use async_trait::async_trait;

use crate::domain::operation::{CatalogRequest, CatalogResponse, OperationKind};

/// ステージが返す制御フロー。
///
/// 例外を制御フローに使わず、「続行」と「意図的な停止」をタグ付きの
/// 結果で表現する。予期しない失敗は `Err`（= StageFault 扱い）で返す。
#[derive(Debug)]
pub enum StageControl<T> {
    /// （必要なら書き換えた）オペレーションを次のステージへ渡す。
    Continue(T),
    /// チェーンをここで打ち切る。理由は呼び出し元にそのまま見える。
    Stop { reason: String },
}

/// ステージの予期しない失敗。
///
/// 意図的な `Stop` とは区別され、リクエスト全体を内部エラーとして
/// 中断させる。リトライはしない。
#[derive(Debug, thiserror::Error)]
#[error("stage '{stage}' faulted: {message}")]
pub struct StageFault {
    pub stage: String,
    pub message: String,
}

/// バックエンド呼び出しの前に実行されるステージ。
///
/// - 変更してよいのはプロパティバッグとペイロードのみ
/// - 受け取った variant と同じ variant を返すこと（構造的な形の保存）
#[async_trait]
pub trait PreStage: Send + Sync {
    /// ログとエラー表示に使う名前。
    fn name(&self) -> &'static str;

    /// このステージが関与するオペレーション種別かどうか。
    fn applies_to(&self, kind: OperationKind) -> bool;

    async fn process(&self, request: CatalogRequest) -> Result<StageControl<CatalogRequest>>;
}

/// バックエンドのレスポンスに対して実行されるステージ。
#[async_trait]
pub trait PostStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies_to(&self, kind: OperationKind) -> bool;

    async fn process(&self, response: CatalogResponse) -> Result<StageControl<CatalogResponse>>;
}
