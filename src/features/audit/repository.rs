use crate::features::audit::models::AuditEntry;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::get_current_jst_timestamp;
use rusqlite::{params, Connection};

/// 監査ログにエントリを記録する
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor_id` - 操作したユーザーのID
/// * `action` - 操作名
/// * `entity` - 対象エンティティの種類
/// * `entity_id` - 対象エンティティのID
/// * `detail` - 補足情報（オプション）
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn record(
    conn: &Connection,
    actor_id: i64,
    action: &str,
    entity: &str,
    entity_id: i64,
    detail: Option<&str>,
) -> AppResult<()> {
    let now = get_current_jst_timestamp();

    conn.execute(
        "INSERT INTO audit_log (actor_id, action, entity, entity_id, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![actor_id, action, entity, entity_id, detail, now],
    )?;

    Ok(())
}

/// 最近の監査ログを取得する（新しい順）
///
/// # 引数
/// * `conn` - データベース接続
/// * `limit` - 取得件数の上限
///
/// # 戻り値
/// 監査ログのリスト、または失敗時はエラー
pub fn find_recent(conn: &Connection, limit: i64) -> AppResult<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, actor_id, action, entity, entity_id, detail, created_at
         FROM audit_log ORDER BY id DESC LIMIT ?1",
    )?;

    let entries = stmt.query_map([limit], |row| {
        Ok(AuditEntry {
            id: row.get(0)?,
            actor_id: row.get(1)?,
            action: row.get(2)?,
            entity: row.get(3)?,
            entity_id: row.get(4)?,
            detail: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;

    entries
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}
