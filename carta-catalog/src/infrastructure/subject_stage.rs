//! 認証済み Subject をプロパティバッグへ伝搬するプリステージ。
//!
//! すべてのチェーンの先頭付近に登録される想定。アンビエントな
//! 認証コンテキスト（外部コラボレーター）への問い合わせはこの
//! ステージに閉じ、後段の認可ステージはバッグの Subject だけを見る。

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::application_service::pipeline::{PreStage, StageControl};
use crate::domain::operation::{keys, CatalogRequest, OperationKind, PropertyValue};
use crate::port::auth_context::AuthContext;

/// Subject 伝搬ステージ。
///
/// - バッグに既に Subject がある場合は上書きしない（冪等）
/// - コンテキストが Subject を返さなくてもチェーンは止めない
pub struct SubjectStage {
    auth: Arc<dyn AuthContext>,
}

impl SubjectStage {
    pub fn new(auth: Arc<dyn AuthContext>) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl PreStage for SubjectStage {
    fn name(&self) -> &'static str {
        "subject-propagation"
    }

    fn applies_to(&self, _kind: OperationKind) -> bool {
        true
    }

    async fn process(&self, mut request: CatalogRequest) -> Result<StageControl<CatalogRequest>> {
        if request.properties().subject().is_none() {
            if let Some(subject) = self.auth.current_subject() {
                tracing::debug!(principal = subject.principal(), "propagating ambient subject");
                request
                    .properties_mut()
                    .insert(keys::SUBJECT, PropertyValue::Subject(subject));
            }
        }

        Ok(StageControl::Continue(request))
    }
}
