use crate::features::audit;
use crate::features::categories::models::{Category, CreateCategoryDto, UpdateCategoryDto};
use crate::features::categories::repository;
use crate::features::roles::{can_administer, Actor, Role};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::validate_category;
use rusqlite::Connection;

/// カテゴリを作成する（管理者のみ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体
/// * `dto` - カテゴリ作成用DTO
///
/// # 戻り値
/// 作成されたカテゴリ、または失敗時はエラー
pub fn create(conn: &Connection, actor: &Actor, dto: CreateCategoryDto) -> AppResult<Category> {
    can_administer(actor)?;
    validate_category(&dto.name)?;

    let category = repository::create(conn, dto)?;
    audit::repository::record(
        conn,
        actor.id,
        "category_create",
        "category",
        category.id,
        Some(&category.name),
    )?;
    log::info!("カテゴリを作成しました: id={}, name={}", category.id, category.name);

    Ok(category)
}

/// カテゴリを更新する（管理者のみ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体
/// * `id` - カテゴリID
/// * `dto` - カテゴリ更新用DTO
///
/// # 戻り値
/// 更新されたカテゴリ、または失敗時はエラー
pub fn update(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    dto: UpdateCategoryDto,
) -> AppResult<Category> {
    can_administer(actor)?;

    if let Some(name) = &dto.name {
        validate_category(name)?;
    }

    let category = repository::update(conn, id, dto)?;
    audit::repository::record(
        conn,
        actor.id,
        "category_update",
        "category",
        category.id,
        Some(&category.name),
    )?;

    Ok(category)
}

/// 申請者が指定カテゴリで経費を申請できることを確認する
///
/// # 引数
/// * `conn` - データベース接続
/// * `category_name` - カテゴリ名
/// * `role` - 申請者のロール
///
/// # 戻り値
/// 申請できる場合はOk(())、カテゴリが存在しない・非アクティブの場合は
/// バリデーションエラー、ロールが不足する場合は権限エラー
pub fn ensure_usable(conn: &Connection, category_name: &str, role: Role) -> AppResult<()> {
    let category = repository::find_by_name(conn, category_name)?
        .ok_or_else(|| AppError::validation(format!("カテゴリ「{category_name}」は存在しません")))?;

    if !category.is_active {
        return Err(AppError::validation(format!(
            "カテゴリ「{category_name}」は利用できません"
        )));
    }

    if !role.permits(category.allowed_role) {
        return Err(AppError::permission_denied(format!(
            "カテゴリ「{category_name}」での申請には{}以上の権限が必要です",
            category.allowed_role.as_str()
        )));
    }

    Ok(())
}
