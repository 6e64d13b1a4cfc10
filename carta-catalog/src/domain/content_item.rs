use crate::domain::metacard::Metacard;

/// ContentItem を一意に識別するための ID。
///
/// ストレージバックエンドがステージング時に採番する。
/// 採番後は不変で、コミットが成功して初めて正式な ID となる。
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// カタログに保存されるバイナリリソースとその属性。
///
/// - `id` / `uri` / `size` はステージング時にバックエンドが設定する
/// - `metacard` は保存後に 1:1 で対応付けられるメタデータレコード
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContentItem {
    id: Option<ItemId>,
    payload: Vec<u8>,
    mime_type: String,
    size: Option<u64>,
    uri: Option<String>,
    metacard: Metacard,
}

impl ContentItem {
    /// 取り込み前の ContentItem を生成する。ID と URI は未採番の状態。
    pub fn new(payload: Vec<u8>, mime_type: impl Into<String>, metacard: Metacard) -> Self {
        Self {
            id: None,
            payload,
            mime_type: mime_type.into(),
            size: None,
            uri: None,
            metacard,
        }
    }

    /// バックエンドが採番した ID・URI・サイズを設定した新しい ContentItem を返す。
    ///
    /// ステージング時にのみ呼ばれる想定。既に ID を持つ場合でも上書きはせず、
    /// 呼び出し側（バックエンド）が事前に検証する。
    pub fn staged(self, id: ItemId, uri: String) -> Self {
        let size = self.payload.len() as u64;
        Self {
            id: Some(id),
            size: Some(size),
            uri: Some(uri),
            ..self
        }
    }

    /// ペイロードのみを差し替えた新しい ContentItem を返す。
    ///
    /// ID・URI は変更しない（更新は同一 ID に対する全置換）。
    pub fn with_payload(self, payload: Vec<u8>) -> Self {
        Self {
            size: None,
            payload,
            ..self
        }
    }

    /// メタデータレコードを差し替えた新しい ContentItem を返す。
    pub fn with_metacard(self, metacard: Metacard) -> Self {
        Self { metacard, ..self }
    }

    pub fn id(&self) -> Option<&ItemId> {
        self.id.as_ref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn metacard(&self) -> &Metacard {
        &self.metacard
    }
}
