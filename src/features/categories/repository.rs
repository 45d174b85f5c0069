use crate::features::categories::models::{Category, CreateCategoryDto, UpdateCategoryDto};
use crate::features::roles::Role;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::get_current_jst_timestamp;
use rusqlite::{params, Connection, Row};

/// 行からカテゴリを組み立てる
fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        allowed_role: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// カテゴリを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - カテゴリ作成用DTO
///
/// # 戻り値
/// 作成されたカテゴリ、または失敗時はエラー
pub fn create(conn: &Connection, dto: CreateCategoryDto) -> AppResult<Category> {
    let now = get_current_jst_timestamp();
    let color = dto.color.unwrap_or_else(|| "#3B82F6".to_string());
    let allowed_role = dto.allowed_role.unwrap_or(Role::User);

    conn.execute(
        "INSERT INTO categories (name, color, allowed_role, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, 1, ?4, ?5)",
        params![dto.name, color, allowed_role, now, now],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)
}

/// IDでカテゴリを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - カテゴリID
///
/// # 戻り値
/// カテゴリ、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Category> {
    conn.query_row(
        "SELECT id, name, color, allowed_role, is_active, created_at, updated_at
         FROM categories WHERE id = ?1",
        params![id],
        row_to_category,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("カテゴリ"),
        _ => AppError::Database(e.to_string()),
    })
}

/// 名前でカテゴリを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `name` - カテゴリ名
///
/// # 戻り値
/// カテゴリ（存在しない場合はNone）、または失敗時はエラー
pub fn find_by_name(conn: &Connection, name: &str) -> AppResult<Option<Category>> {
    match conn.query_row(
        "SELECT id, name, color, allowed_role, is_active, created_at, updated_at
         FROM categories WHERE name = ?1",
        params![name],
        row_to_category,
    ) {
        Ok(category) => Ok(Some(category)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(AppError::Database(e.to_string())),
    }
}

/// カテゴリ一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `active_only` - アクティブなカテゴリのみを取得するか
///
/// # 戻り値
/// カテゴリのリスト、または失敗時はエラー
pub fn find_all(conn: &Connection, active_only: bool) -> AppResult<Vec<Category>> {
    let query = if active_only {
        "SELECT id, name, color, allowed_role, is_active, created_at, updated_at
         FROM categories WHERE is_active = 1 ORDER BY name"
    } else {
        "SELECT id, name, color, allowed_role, is_active, created_at, updated_at
         FROM categories ORDER BY name"
    };

    let mut stmt = conn.prepare(query)?;
    let categories = stmt.query_map([], row_to_category)?;

    categories
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// 指定ロールの申請者が利用できるカテゴリ一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `role` - 申請者のロール
///
/// # 戻り値
/// 利用可能なカテゴリのリスト、または失敗時はエラー
///
/// 非アクティブなカテゴリと、申請者のロールを超えるallowed_roleを持つ
/// カテゴリは結果に含まれない。
pub fn find_visible_for_role(conn: &Connection, role: Role) -> AppResult<Vec<Category>> {
    let all = find_all(conn, true)?;
    Ok(all.into_iter().filter(|c| c.is_visible_to(role)).collect())
}

/// カテゴリを更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - カテゴリID
/// * `dto` - カテゴリ更新用DTO
///
/// # 戻り値
/// 更新されたカテゴリ、または失敗時はエラー
pub fn update(conn: &Connection, id: i64, dto: UpdateCategoryDto) -> AppResult<Category> {
    let now = get_current_jst_timestamp();

    // 既存のカテゴリを取得
    let existing = find_by_id(conn, id)?;

    // 更新するフィールドを決定
    let name = dto.name.unwrap_or(existing.name);
    let color = dto.color.unwrap_or(existing.color);
    let allowed_role = dto.allowed_role.unwrap_or(existing.allowed_role);
    let is_active = dto.is_active.unwrap_or(existing.is_active);

    conn.execute(
        "UPDATE categories SET name = ?1, color = ?2, allowed_role = ?3, is_active = ?4, updated_at = ?5
         WHERE id = ?6",
        params![name, color, allowed_role, is_active as i64, now, id],
    )?;

    find_by_id(conn, id)
}
