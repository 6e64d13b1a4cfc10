use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// メタデータ属性の型付き値。
///
/// 属性は多値を取り得るため、Metacard 側では `Vec<AttributeValue>` で保持する。
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
}

/// ContentItem に 1:1 で対応付けられる型付き属性バッグ（メタデータレコード）。
///
/// - 属性名のスキーマ登録・検証はバリデーションステージの責務で、ここでは扱わない
/// - `modified` は更新のたびにバックエンドが `touch()` で進める
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Metacard {
    id: String,
    source_id: String,
    attributes: HashMap<String, Vec<AttributeValue>>,
    created_at: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl Metacard {
    pub fn new(id: impl Into<String>, source_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            source_id: source_id.into(),
            attributes: HashMap::new(),
            created_at: now,
            modified: now,
        }
    }

    /// 属性を設定した新しい Metacard を返す（ビルダー用途）。
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.entry(name.into()).or_default().push(value);
        self
    }

    /// 属性を全置換で設定する。
    pub fn set_attribute(&mut self, name: impl Into<String>, values: Vec<AttributeValue>) {
        self.attributes.insert(name.into(), values);
    }

    pub fn attribute(&self, name: &str) -> Option<&[AttributeValue]> {
        self.attributes.get(name).map(|v| v.as_slice())
    }

    /// 先頭の属性値のみを返す（単値属性向けのショートカット）。
    pub fn first_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name).and_then(|v| v.first())
    }

    /// `modified` のみを現在時刻に進めた新しい Metacard を返す。
    pub fn touch(&self) -> Self {
        Self {
            modified: Utc::now(),
            attributes: self.attributes.clone(),
            id: self.id.clone(),
            source_id: self.source_id.clone(),
            created_at: self.created_at,
        }
    }

    /// ID を差し替えた新しい Metacard を返す。
    ///
    /// バックエンドがステージング時に ContentItem の ID と揃えるために使う。
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_id: self.source_id.clone(),
            attributes: self.attributes.clone(),
            created_at: self.created_at,
            modified: self.modified,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metacard_has_equal_timestamps() {
        let card = Metacard::new("meta-1", "src-1");

        assert_eq!(card.id(), "meta-1");
        assert_eq!(card.source_id(), "src-1");
        assert_eq!(card.created_at(), card.modified());
    }

    #[test]
    fn attributes_are_multi_valued() {
        let card = Metacard::new("meta-1", "src-1")
            .with_attribute("keyword", AttributeValue::Text("alpha".into()))
            .with_attribute("keyword", AttributeValue::Text("beta".into()));

        let values = card.attribute("keyword").unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(
            card.first_attribute("keyword"),
            Some(&AttributeValue::Text("alpha".into()))
        );
    }

    #[test]
    fn touch_advances_modified_only() {
        let card = Metacard::new("meta-1", "src-1");
        let touched = card.touch();

        assert!(touched.modified() >= card.modified());
        assert_eq!(touched.created_at(), card.created_at());
        assert_eq!(touched.id(), card.id());
    }

    #[test]
    fn serde_round_trip_preserves_attributes() {
        let card = Metacard::new("meta-1", "src-1")
            .with_attribute("title", AttributeValue::Text("report".into()))
            .with_attribute("pages", AttributeValue::Integer(12));

        let json = serde_json::to_string(&card).unwrap();
        let restored: Metacard = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id(), card.id());
        assert_eq!(restored.source_id(), card.source_id());
        assert_eq!(restored.modified(), card.modified());
        assert_eq!(restored.attribute("title"), card.attribute("title"));
        assert_eq!(restored.attribute("pages"), card.attribute("pages"));
    }

    #[test]
    fn with_id_keeps_attributes_and_timestamps() {
        let card = Metacard::new("meta-1", "src-1")
            .with_attribute("title", AttributeValue::Text("report".into()));
        let renamed = card.with_id("item-9");

        assert_eq!(renamed.id(), "item-9");
        assert_eq!(renamed.modified(), card.modified());
        assert!(renamed.attribute("title").is_some());
    }
}
