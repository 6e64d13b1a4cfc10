use std::collections::HashMap;

use crate::domain::content_item::{ContentItem, ItemId};
use crate::domain::metacard::{AttributeValue, Metacard};
use crate::domain::subject::Subject;

/// パイプラインが扱うオペレーションの種別。
///
/// ステージは `applies_to` でこの種別を見て、自分が関与するかどうかを宣言する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    Query,
    Resource,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Query => "query",
            OperationKind::Resource => "resource",
        };
        write!(f, "{name}")
    }
}

/// プロパティバッグに格納できる型付きの値。
///
/// 任意型のマップではなく enum にすることで、ステージ間の受け渡しを
/// ダウンキャストなしで検査できるようにしている。
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Subject(Subject),
}

/// ステージ間で共有される唯一の可変サイドチャネル。
///
/// よく使うキーは [`keys`] に定数として定義する。
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    entries: HashMap<String, PropertyValue>,
}

/// プロパティバッグの既知キー。
pub mod keys {
    /// 伝搬された認証済み Subject。
    pub const SUBJECT: &str = "subject";
    /// リソースサイズのヒント（使用量集計コラボレーター向け）。
    pub const RESOURCE_SIZE: &str = "resource-size";
    /// CacheKey 導出に使うソース ID。
    pub const SOURCE_ID: &str = "source-id";
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(PropertyValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        match self.entries.get(key) {
            Some(PropertyValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    /// [`keys::SUBJECT`] に格納された Subject を返すショートカット。
    pub fn subject(&self) -> Option<&Subject> {
        match self.entries.get(keys::SUBJECT) {
            Some(PropertyValue::Subject(s)) => Some(s),
            _ => None,
        }
    }
}

/// Query オペレーションが運ぶ検索式。
///
/// 本体のインデックスエンジンは外部コラボレーターであり、ここでは
/// パイプラインを通すための最小限のプレースホルダのみを定義する。
/// クエリ言語の定義は Non-goal。
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpression {
    ById(ItemId),
    AttributeEquals { name: String, value: AttributeValue },
}

/// バッチ内の 1 アイテムに対する失敗。
///
/// create/update のステージングは部分成功を許すため、成功アイテムと
/// 並べてレスポンスに載る。
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFault {
    /// 入力バッチ内の位置。
    pub index: usize,
    /// 採番済みであればそのアイテムの ID。
    pub id: Option<ItemId>,
    pub reason: String,
}

/// 取り込み（Create）リクエスト。
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub items: Vec<ContentItem>,
    pub properties: PropertyBag,
}

/// 更新（Update）リクエスト。アイテムは採番済み ID を持つこと。
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub items: Vec<ContentItem>,
    pub properties: PropertyBag,
}

/// 削除（Delete）リクエスト。
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub ids: Vec<ItemId>,
    pub properties: PropertyBag,
}

/// 検索（Query）リクエスト。
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub expression: QueryExpression,
    pub properties: PropertyBag,
}

/// リソース取得（Resource）リクエスト。
///
/// `uri` はリモートソース上のロケーター。CacheKey の導出には
/// プロパティバッグの [`keys::SOURCE_ID`]（無ければ metacard のソース ID）を使う。
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub metacard: Metacard,
    pub uri: String,
    pub properties: PropertyBag,
}

#[derive(Debug, Clone)]
pub struct CreateResponse {
    pub created: Vec<ContentItem>,
    pub faults: Vec<ItemFault>,
    pub properties: PropertyBag,
}

#[derive(Debug, Clone)]
pub struct UpdateResponse {
    pub updated: Vec<ContentItem>,
    pub faults: Vec<ItemFault>,
    pub properties: PropertyBag,
}

#[derive(Debug, Clone)]
pub struct DeleteResponse {
    pub deleted: Vec<ContentItem>,
    pub faults: Vec<ItemFault>,
    pub properties: PropertyBag,
}

#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub hits: Vec<ContentItem>,
    pub properties: PropertyBag,
}

#[derive(Debug, Clone)]
pub struct ResourceResponse {
    pub payload: Vec<u8>,
    pub mime_type: String,
    pub from_cache: bool,
    pub properties: PropertyBag,
}

/// ステージを通過する in-flight のリクエスト。
///
/// チェーン実行中はこの enum のまま受け渡し、ステージは variant を
/// 変えずに（= 構造的な形を保って）返すことが契約となる。
#[derive(Debug, Clone)]
pub enum CatalogRequest {
    Create(CreateRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
    Query(QueryRequest),
    Resource(ResourceRequest),
}

impl CatalogRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            CatalogRequest::Create(_) => OperationKind::Create,
            CatalogRequest::Update(_) => OperationKind::Update,
            CatalogRequest::Delete(_) => OperationKind::Delete,
            CatalogRequest::Query(_) => OperationKind::Query,
            CatalogRequest::Resource(_) => OperationKind::Resource,
        }
    }

    pub fn properties(&self) -> &PropertyBag {
        match self {
            CatalogRequest::Create(r) => &r.properties,
            CatalogRequest::Update(r) => &r.properties,
            CatalogRequest::Delete(r) => &r.properties,
            CatalogRequest::Query(r) => &r.properties,
            CatalogRequest::Resource(r) => &r.properties,
        }
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        match self {
            CatalogRequest::Create(r) => &mut r.properties,
            CatalogRequest::Update(r) => &mut r.properties,
            CatalogRequest::Delete(r) => &mut r.properties,
            CatalogRequest::Query(r) => &mut r.properties,
            CatalogRequest::Resource(r) => &mut r.properties,
        }
    }
}

/// オペレーション種別と対になるレスポンス。
///
/// ポストステージはこちらを受け取り、プリステージやバックエンドが
/// バッグに記録した値を読める。
#[derive(Debug, Clone)]
pub enum CatalogResponse {
    Create(CreateResponse),
    Update(UpdateResponse),
    Delete(DeleteResponse),
    Query(QueryResponse),
    Resource(ResourceResponse),
}

impl CatalogResponse {
    pub fn kind(&self) -> OperationKind {
        match self {
            CatalogResponse::Create(_) => OperationKind::Create,
            CatalogResponse::Update(_) => OperationKind::Update,
            CatalogResponse::Delete(_) => OperationKind::Delete,
            CatalogResponse::Query(_) => OperationKind::Query,
            CatalogResponse::Resource(_) => OperationKind::Resource,
        }
    }

    pub fn properties(&self) -> &PropertyBag {
        match self {
            CatalogResponse::Create(r) => &r.properties,
            CatalogResponse::Update(r) => &r.properties,
            CatalogResponse::Delete(r) => &r.properties,
            CatalogResponse::Query(r) => &r.properties,
            CatalogResponse::Resource(r) => &r.properties,
        }
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        match self {
            CatalogResponse::Create(r) => &mut r.properties,
            CatalogResponse::Update(r) => &mut r.properties,
            CatalogResponse::Delete(r) => &mut r.properties,
            CatalogResponse::Query(r) => &mut r.properties,
            CatalogResponse::Resource(r) => &mut r.properties,
        }
    }
}
