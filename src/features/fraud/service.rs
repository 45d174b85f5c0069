use crate::features::audit;
use crate::features::expenses::models::{Expense, ExpenseStatus};
use crate::features::expenses::repository;
use crate::features::roles::{can_act, can_administer, Actor, ExpenseAction, Role};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::in_flight::InFlightRegistry;
use crate::shared::utils::validate_required_field;
use rusqlite::Connection;

/// 外部スコアリング機構の操作として監査ログに記録するID
const SYSTEM_ACTOR_ID: i64 = 0;

/// 承認待ちの経費に不正フラグを付与する
///
/// # 引数
/// * `conn` - データベース接続
/// * `expense_id` - 経費ID
/// * `confidence_score` - 不正の確度（0.0〜1.0）
/// * `reason` - フラグ付与の理由
///
/// # 戻り値
/// フラグ付与後の経費、または失敗時はエラー
///
/// 外部スコアリング機構からのエントリポイント。終了状態の経費には
/// 付与できない。`confidence_score`は助言的なメタデータであり、
/// 付与によって状態遷移が自動的に起こることはない。
pub fn flag(
    conn: &Connection,
    expense_id: i64,
    confidence_score: f64,
    reason: &str,
) -> AppResult<Expense> {
    if !(0.0..=1.0).contains(&confidence_score) {
        return Err(AppError::validation(
            "不正スコアは0.0から1.0の間で指定してください",
        ));
    }
    validate_required_field(reason, "フラグ理由")?;

    let expense = repository::find_by_id(conn, expense_id)?;
    if expense.status.is_terminal() {
        return Err(AppError::invalid_transition(
            "承認・却下済みの経費にはフラグを付与できません",
        ));
    }

    let flagged = repository::set_fraud_flag(conn, expense_id, confidence_score, reason)?;
    audit::repository::record(
        conn,
        SYSTEM_ACTOR_ID,
        "fraud_flag",
        "expense",
        expense_id,
        Some(&format!("score={confidence_score}: {reason}")),
    )?;
    log::warn!("不正フラグを付与しました: id={expense_id}, score={confidence_score}");

    Ok(flagged)
}

/// 不正フラグ付きの経費を強制却下する
///
/// # 引数
/// * `conn` - データベース接続
/// * `in_flight` - 実行中操作のレジストリ
/// * `actor` - 操作主体（マネージャーまたは管理者）
/// * `id` - 経費ID
/// * `reason` - 却下理由（必須）
///
/// # 戻り値
/// 却下後の経費、または失敗時はエラー
///
/// フラグ付きの経費に許可される唯一の状態遷移。通常の却下と同じ
/// 審査権限（自己承認の禁止を含む）が適用される。不正スコアと理由は
/// 却下後も監査証跡として残る。
pub fn terminate(
    conn: &Connection,
    in_flight: &InFlightRegistry,
    actor: &Actor,
    id: i64,
    reason: &str,
) -> AppResult<Expense> {
    let _guard = in_flight
        .begin("terminate", id)
        .ok_or_else(|| AppError::validation("強制却下処理が実行中です"))?;

    validate_required_field(reason, "却下理由")?;

    let expense = repository::find_by_id(conn, id)?;

    match expense.status {
        ExpenseStatus::Rejected => return Ok(expense),
        ExpenseStatus::Approved => {
            return Err(AppError::invalid_transition(
                "承認済みの経費は強制却下できません",
            ));
        }
        ExpenseStatus::Pending => {}
    }

    if !expense.is_flagged() {
        return Err(AppError::invalid_transition(
            "不正フラグのない経費は通常の却下を使用してください",
        ));
    }

    can_act(actor, expense.owner_id, expense.team_id, ExpenseAction::Terminate)?;

    if !repository::mark_rejected(conn, id, reason.trim())? {
        return Err(AppError::invalid_transition(
            "経費は既に処理されています",
        ));
    }

    audit::repository::record(
        conn,
        actor.id,
        ExpenseAction::Terminate.as_str(),
        "expense",
        id,
        Some(reason.trim()),
    )?;
    log::info!("経費を強制却下しました: id={id}, actor={}", actor.id);

    repository::find_by_id(conn, id)
}

/// 不正フラグを解除する（管理者のみ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体
/// * `id` - 経費ID
///
/// # 戻り値
/// 解除後の経費、または失敗時はエラー
///
/// 解除後は通常の承認経路が再び開く。解除は必ず監査ログに記録される。
pub fn clear_flag(conn: &Connection, actor: &Actor, id: i64) -> AppResult<Expense> {
    can_administer(actor)?;

    let expense = repository::find_by_id(conn, id)?;
    if !expense.is_flagged() {
        return Err(AppError::validation(
            "この経費には不正フラグが付与されていません",
        ));
    }

    let cleared = repository::clear_fraud_flag(conn, id)?;
    audit::repository::record(conn, actor.id, "fraud_clear", "expense", id, None)?;
    log::info!("不正フラグを解除しました: id={id}, actor={}", actor.id);

    Ok(cleared)
}

/// 不正フラグ付きの審査キューを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体（マネージャーまたは管理者）
///
/// # 戻り値
/// フラグ付きの承認待ち経費のリスト（スコア降順）、または失敗時はエラー
///
/// 管理者は全チーム、マネージャーは自チームのキューのみ閲覧できる。
pub fn find_flagged(conn: &Connection, actor: &Actor) -> AppResult<Vec<Expense>> {
    match actor.role {
        Role::Admin => repository::find_flagged(conn, None),
        Role::Manager => {
            let team_id = actor.team_id.ok_or_else(|| {
                AppError::permission_denied("チームに所属していないため閲覧できません")
            })?;
            repository::find_flagged(conn, Some(team_id))
        }
        Role::User => Err(AppError::permission_denied(
            "審査キューの閲覧にはマネージャー以上の権限が必要です",
        )),
    }
}
