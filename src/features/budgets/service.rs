use crate::features::audit;
use crate::features::budgets::models::{BudgetPeriod, PeriodStatus};
use crate::features::budgets::repository;
use crate::features::roles::{can_administer, Actor};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{month_year_of, validate_amount};
use rusqlite::Connection;

/// 指定日付が属する期間の状態を確認する
///
/// # 引数
/// * `conn` - データベース接続
/// * `team_id` - チームID
/// * `date` - 日付（YYYY-MM-DD形式）
/// * `proposed_amount` - 申請予定の金額（超過判定用）
///
/// # 戻り値
/// 期間の状態（凍結・予算・支出・残額・超過フラグ）、または失敗時はエラー
///
/// 予算レコードが存在しない期間は「凍結なし・上限なし」として扱う。
/// `budget_amount = 0`は上限なしの番兵値であり、超過判定の対象外。
pub fn check_period(
    conn: &Connection,
    team_id: i64,
    date: &str,
    proposed_amount: f64,
) -> AppResult<PeriodStatus> {
    let (month, year) = month_year_of(date)?;

    let period = repository::find_by_period(conn, team_id, month, year)?;
    let spent_amount = repository::approved_spend(conn, team_id, month, year)?;

    let (frozen, budget_amount) = match &period {
        Some(p) => (p.frozen, p.budget_amount),
        None => (false, 0.0),
    };

    // budget_amount = 0 は上限なし
    let has_limit = budget_amount > 0.0;
    let remaining = if has_limit {
        budget_amount - spent_amount
    } else {
        0.0
    };
    let exceeded = has_limit && spent_amount + proposed_amount > budget_amount;

    Ok(PeriodStatus {
        frozen,
        budget_amount,
        spent_amount,
        remaining,
        exceeded,
    })
}

/// 指定日付の期間が凍結されていないことを確認する
///
/// # 引数
/// * `conn` - データベース接続
/// * `team_id` - チームID
/// * `date` - 日付（YYYY-MM-DD形式）
///
/// # 戻り値
/// 凍結されていない場合はOk(())、凍結中の場合はPeriodFrozenエラー
///
/// 凍結は新規の支出（申請と金額・日付の変更）をブロックするが、
/// 既存の承認待ち経費の承認・却下はブロックしない。
pub fn ensure_not_frozen(conn: &Connection, team_id: i64, date: &str) -> AppResult<()> {
    let (month, year) = month_year_of(date)?;

    if let Some(period) = repository::find_by_period(conn, team_id, month, year)? {
        if period.frozen {
            return Err(AppError::period_frozen(format!(
                "{year}年{month}月は申請を受け付けていません"
            )));
        }
    }

    Ok(())
}

/// 予算額を設定する（管理者のみ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体
/// * `team_id` - チームID
/// * `month` - 月（1〜12）
/// * `year` - 年
/// * `budget_amount` - 予算額（0 = 上限なし）
///
/// # 戻り値
/// 設定後の予算期間、または失敗時はエラー
pub fn set_budget(
    conn: &Connection,
    actor: &Actor,
    team_id: i64,
    month: i64,
    year: i64,
    budget_amount: f64,
) -> AppResult<BudgetPeriod> {
    can_administer(actor)?;
    validate_amount(budget_amount)?;

    if !(1..=12).contains(&month) {
        return Err(AppError::validation("月は1から12の間で指定してください"));
    }

    let period = repository::upsert_budget(conn, team_id, month, year, budget_amount)?;
    audit::repository::record(
        conn,
        actor.id,
        "budget_set",
        "budget_period",
        period.id,
        Some(&format!("{year}/{month} = {budget_amount}")),
    )?;
    log::info!("予算を設定しました: team={team_id}, {year}/{month}, amount={budget_amount}");

    Ok(period)
}

/// 期間を凍結する（管理者のみ、冪等）
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体
/// * `team_id` - チームID
/// * `month` - 月（1〜12）
/// * `year` - 年
///
/// # 戻り値
/// 凍結後の予算期間、または失敗時はエラー
///
/// 既に凍結済みの期間への再凍結はエラーではなく成功として扱う。
pub fn freeze_period(
    conn: &Connection,
    actor: &Actor,
    team_id: i64,
    month: i64,
    year: i64,
) -> AppResult<BudgetPeriod> {
    can_administer(actor)?;

    if !(1..=12).contains(&month) {
        return Err(AppError::validation("月は1から12の間で指定してください"));
    }

    let period = repository::set_frozen(conn, team_id, month, year, true)?;
    audit::repository::record(
        conn,
        actor.id,
        "freeze",
        "budget_period",
        period.id,
        Some(&format!("{year}/{month}")),
    )?;
    log::info!("期間を凍結しました: team={team_id}, {year}/{month}");

    Ok(period)
}

/// 期間の凍結を解除する（管理者のみ、冪等）
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体
/// * `team_id` - チームID
/// * `month` - 月（1〜12）
/// * `year` - 年
///
/// # 戻り値
/// 解除後の予算期間、または失敗時はエラー
pub fn unfreeze_period(
    conn: &Connection,
    actor: &Actor,
    team_id: i64,
    month: i64,
    year: i64,
) -> AppResult<BudgetPeriod> {
    can_administer(actor)?;

    if !(1..=12).contains(&month) {
        return Err(AppError::validation("月は1から12の間で指定してください"));
    }

    let period = repository::set_frozen(conn, team_id, month, year, false)?;
    audit::repository::record(
        conn,
        actor.id,
        "unfreeze",
        "budget_period",
        period.id,
        Some(&format!("{year}/{month}")),
    )?;
    log::info!("期間の凍結を解除しました: team={team_id}, {year}/{month}");

    Ok(period)
}
