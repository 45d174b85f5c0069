use crate::features::policies::models::{CreatePolicyDto, Policy, UpdatePolicyDto};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::get_current_jst_timestamp;
use rusqlite::{params, Connection, Row};

/// 行からポリシーを組み立てる
///
/// allowed_categoriesはJSON配列文字列として格納されている。
fn row_to_policy(row: &Row) -> rusqlite::Result<Policy> {
    let categories_json: String = row.get(7)?;
    let allowed_categories: Vec<String> =
        serde_json::from_str(&categories_json).unwrap_or_default();

    Ok(Policy {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        team_id: row.get(3)?,
        max_amount: row.get(4)?,
        monthly_limit: row.get(5)?,
        requires_receipt: row.get::<_, i64>(6)? != 0,
        allowed_categories,
        is_active: row.get::<_, i64>(8)? != 0,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const POLICY_COLUMNS: &str = "id, name, description, team_id, max_amount, monthly_limit,
    requires_receipt, allowed_categories, is_active, created_at, updated_at";

/// ポリシーを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - ポリシー作成用DTO
///
/// # 戻り値
/// 作成されたポリシー、または失敗時はエラー
pub fn create(conn: &Connection, dto: CreatePolicyDto) -> AppResult<Policy> {
    let now = get_current_jst_timestamp();
    let categories_json = serde_json::to_string(&dto.allowed_categories)
        .map_err(|e| AppError::Database(e.to_string()))?;

    conn.execute(
        "INSERT INTO policies (name, description, team_id, max_amount, monthly_limit,
            requires_receipt, allowed_categories, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)",
        params![
            dto.name,
            dto.description,
            dto.team_id,
            dto.max_amount,
            dto.monthly_limit,
            dto.requires_receipt as i64,
            categories_json,
            now,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)
}

/// IDでポリシーを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - ポリシーID
///
/// # 戻り値
/// ポリシー、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Policy> {
    conn.query_row(
        &format!("SELECT {POLICY_COLUMNS} FROM policies WHERE id = ?1"),
        params![id],
        row_to_policy,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("ポリシー"),
        _ => AppError::Database(e.to_string()),
    })
}

/// ポリシー一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// ポリシーのリスト、または失敗時はエラー
pub fn find_all(conn: &Connection) -> AppResult<Vec<Policy>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {POLICY_COLUMNS} FROM policies ORDER BY name"))?;
    let policies = stmt.query_map([], row_to_policy)?;

    policies
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// アクティブなポリシー一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// アクティブなポリシーのリスト、または失敗時はエラー
pub fn find_active(conn: &Connection) -> AppResult<Vec<Policy>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POLICY_COLUMNS} FROM policies WHERE is_active = 1 ORDER BY name"
    ))?;
    let policies = stmt.query_map([], row_to_policy)?;

    policies
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// ポリシーを更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - ポリシーID
/// * `dto` - ポリシー更新用DTO
///
/// # 戻り値
/// 更新されたポリシー、または失敗時はエラー
pub fn update(conn: &Connection, id: i64, dto: UpdatePolicyDto) -> AppResult<Policy> {
    let now = get_current_jst_timestamp();

    // 既存のポリシーを取得
    let existing = find_by_id(conn, id)?;

    // 更新するフィールドを決定
    let name = dto.name.unwrap_or(existing.name);
    let description = dto.description.or(existing.description);
    let max_amount = dto.max_amount.or(existing.max_amount);
    let monthly_limit = dto.monthly_limit.or(existing.monthly_limit);
    let requires_receipt = dto.requires_receipt.unwrap_or(existing.requires_receipt);
    let allowed_categories = dto
        .allowed_categories
        .unwrap_or(existing.allowed_categories);
    let is_active = dto.is_active.unwrap_or(existing.is_active);

    let categories_json = serde_json::to_string(&allowed_categories)
        .map_err(|e| AppError::Database(e.to_string()))?;

    conn.execute(
        "UPDATE policies SET name = ?1, description = ?2, max_amount = ?3, monthly_limit = ?4,
            requires_receipt = ?5, allowed_categories = ?6, is_active = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            name,
            description,
            max_amount,
            monthly_limit,
            requires_receipt as i64,
            categories_json,
            is_active as i64,
            now,
            id
        ],
    )?;

    find_by_id(conn, id)
}

/// ポリシーを削除する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - ポリシーID
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let affected_rows = conn.execute("DELETE FROM policies WHERE id = ?1", params![id])?;

    if affected_rows == 0 {
        return Err(AppError::not_found("ポリシー"));
    }

    Ok(())
}
