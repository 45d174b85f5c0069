use serde::{Deserialize, Serialize};

/// 監査ログエントリ
///
/// 承認・却下・凍結・ポリシー変更などの追跡対象操作を追記専用で記録する。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditEntry {
    pub id: i64,
    /// 操作したユーザーのID
    pub actor_id: i64,
    /// 操作名（"approve"、"freeze"など）
    pub action: String,
    /// 対象エンティティの種類（"expense"、"budget_period"など）
    pub entity: String,
    /// 対象エンティティのID
    pub entity_id: i64,
    /// 補足情報（却下理由など）
    pub detail: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_entry_serialization() {
        let entry = AuditEntry {
            id: 1,
            actor_id: 5,
            action: "approve".to_string(),
            entity: "expense".to_string(),
            entity_id: 42,
            detail: None,
            created_at: "2024-03-01T00:00:00+09:00".to_string(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"action\":\"approve\""));
        assert!(json.contains("\"entity_id\":42"));
    }
}
