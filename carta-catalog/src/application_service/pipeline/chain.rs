use std::sync::Arc;

use crate::application_service::pipeline::stage::{PostStage, PreStage, StageControl, StageFault};
use crate::domain::operation::{CatalogRequest, CatalogResponse};

/// 登録順にステージを実行するチェーン実行器。
///
/// - プリ／ポストの 2 本のチェーンを持ち、それぞれ独立に順序付けられる
/// - ステージが `Stop` を返した時点で後続ステージは実行されない
/// - ステージの予期しない失敗（`Err`）は [`StageFault`] として即座に浮上する
/// - チェーンはオーケストレーター構築時に固定され、実行時の動的検索はしない
///
/// 1 回の実行内でのステージ走査は逐次であり、同一オペレーション
/// オブジェクトに複数タスクから再入しないことを実行器側で保証する。
#[derive(Clone, Default)]
pub struct PluginChain {
    pre: Vec<Arc<dyn PreStage>>,
    post: Vec<Arc<dyn PostStage>>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// プリステージを末尾に登録する。
    pub fn with_pre_stage(mut self, stage: Arc<dyn PreStage>) -> Self {
        self.pre.push(stage);
        self
    }

    /// ポストステージを末尾に登録する。
    pub fn with_post_stage(mut self, stage: Arc<dyn PostStage>) -> Self {
        self.post.push(stage);
        self
    }

    /// 別のチェーンのステージを（その登録順のまま）末尾に連結する。
    pub fn merge(mut self, other: PluginChain) -> Self {
        self.pre.extend(other.pre);
        self.post.extend(other.post);
        self
    }

    pub fn pre_len(&self) -> usize {
        self.pre.len()
    }

    pub fn post_len(&self) -> usize {
        self.post.len()
    }

    /// プリチェーンを実行する。
    ///
    /// 空のチェーンは no-op として `Continue` を返す。`Stop` の場合、
    /// 部分的に書き換えられたリクエストは破棄される前提で理由のみ返す。
    pub async fn run_pre(
        &self,
        mut request: CatalogRequest,
    ) -> Result<StageControl<CatalogRequest>, StageFault> {
        let kind = request.kind();

        for stage in &self.pre {
            if !stage.applies_to(kind) {
                continue;
            }

            tracing::debug!(stage = stage.name(), operation = %kind, "running pre stage");

            match stage.process(request).await {
                Ok(StageControl::Continue(next)) => {
                    request = next;
                }
                Ok(StageControl::Stop { reason }) => {
                    tracing::info!(
                        stage = stage.name(),
                        operation = %kind,
                        reason = %reason,
                        "pre chain stopped"
                    );
                    return Ok(StageControl::Stop { reason });
                }
                Err(e) => {
                    tracing::error!(
                        stage = stage.name(),
                        operation = %kind,
                        error = %format!("{e:#}"),
                        "pre stage faulted"
                    );
                    return Err(StageFault {
                        stage: stage.name().to_string(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }

        Ok(StageControl::Continue(request))
    }

    /// ポストチェーンを実行する。制御フローはプリチェーンと同じ。
    pub async fn run_post(
        &self,
        mut response: CatalogResponse,
    ) -> Result<StageControl<CatalogResponse>, StageFault> {
        let kind = response.kind();

        for stage in &self.post {
            if !stage.applies_to(kind) {
                continue;
            }

            tracing::debug!(stage = stage.name(), operation = %kind, "running post stage");

            match stage.process(response).await {
                Ok(StageControl::Continue(next)) => {
                    response = next;
                }
                Ok(StageControl::Stop { reason }) => {
                    tracing::info!(
                        stage = stage.name(),
                        operation = %kind,
                        reason = %reason,
                        "post chain stopped"
                    );
                    return Ok(StageControl::Stop { reason });
                }
                Err(e) => {
                    tracing::error!(
                        stage = stage.name(),
                        operation = %kind,
                        error = %format!("{e:#}"),
                        "post stage faulted"
                    );
                    return Err(StageFault {
                        stage: stage.name().to_string(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }

        Ok(StageControl::Continue(response))
    }
}
