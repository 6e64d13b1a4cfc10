use std::collections::HashMap;

/// 認証済みの呼び出し元を表す識別情報。
///
/// トークン交換サービス（スコープ外の外部コラボレーター）が生成したものを、
/// パイプラインのプロパティバッグ経由で後段のステージへ伝搬する。
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Subject {
    principal: String,
    claims: HashMap<String, String>,
}

impl Subject {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            claims: HashMap::new(),
        }
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_holds_principal_and_claims() {
        let subject = Subject::new("alice").with_claim("role", "ingester");

        assert_eq!(subject.principal(), "alice");
        assert_eq!(subject.claim("role"), Some("ingester"));
        assert_eq!(subject.claim("missing"), None);
    }
}
