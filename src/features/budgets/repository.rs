use crate::features::budgets::models::BudgetPeriod;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::get_current_jst_timestamp;
use rusqlite::{params, Connection, Row};

/// 行から予算期間を組み立てる
fn row_to_period(row: &Row) -> rusqlite::Result<BudgetPeriod> {
    Ok(BudgetPeriod {
        id: row.get(0)?,
        team_id: row.get(1)?,
        month: row.get(2)?,
        year: row.get(3)?,
        budget_amount: row.get(4)?,
        frozen: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// (チーム, 月, 年)で予算期間を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `team_id` - チームID
/// * `month` - 月（1〜12）
/// * `year` - 年
///
/// # 戻り値
/// 予算期間（未設定の場合はNone）、または失敗時はエラー
pub fn find_by_period(
    conn: &Connection,
    team_id: i64,
    month: i64,
    year: i64,
) -> AppResult<Option<BudgetPeriod>> {
    match conn.query_row(
        "SELECT id, team_id, month, year, budget_amount, frozen, created_at, updated_at
         FROM budget_periods WHERE team_id = ?1 AND month = ?2 AND year = ?3",
        params![team_id, month, year],
        row_to_period,
    ) {
        Ok(period) => Ok(Some(period)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(AppError::Database(e.to_string())),
    }
}

/// 予算額を設定する（既存レコードがあれば更新、なければ作成）
///
/// # 引数
/// * `conn` - データベース接続
/// * `team_id` - チームID
/// * `month` - 月（1〜12）
/// * `year` - 年
/// * `budget_amount` - 予算額（0 = 上限なし）
///
/// # 戻り値
/// 設定後の予算期間、または失敗時はエラー
pub fn upsert_budget(
    conn: &Connection,
    team_id: i64,
    month: i64,
    year: i64,
    budget_amount: f64,
) -> AppResult<BudgetPeriod> {
    let now = get_current_jst_timestamp();

    conn.execute(
        "INSERT INTO budget_periods (team_id, month, year, budget_amount, frozen, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
         ON CONFLICT(team_id, month, year)
         DO UPDATE SET budget_amount = ?4, updated_at = ?5",
        params![team_id, month, year, budget_amount, now],
    )?;

    find_by_period(conn, team_id, month, year)?
        .ok_or_else(|| AppError::Database("予算期間の保存に失敗しました".to_string()))
}

/// 凍結フラグを設定する（冪等）
///
/// # 引数
/// * `conn` - データベース接続
/// * `team_id` - チームID
/// * `month` - 月（1〜12）
/// * `year` - 年
/// * `frozen` - 凍結するか
///
/// # 戻り値
/// 設定後の予算期間、または失敗時はエラー
///
/// レコードが存在しない場合は予算0（上限なし）で作成してからフラグを設定する。
/// 既に同じ状態の期間への再設定は成功として扱う（エラーにしない）。
pub fn set_frozen(
    conn: &Connection,
    team_id: i64,
    month: i64,
    year: i64,
    frozen: bool,
) -> AppResult<BudgetPeriod> {
    let now = get_current_jst_timestamp();

    conn.execute(
        "INSERT INTO budget_periods (team_id, month, year, budget_amount, frozen, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)
         ON CONFLICT(team_id, month, year)
         DO UPDATE SET frozen = ?4, updated_at = ?5",
        params![team_id, month, year, frozen as i64, now],
    )?;

    find_by_period(conn, team_id, month, year)?
        .ok_or_else(|| AppError::Database("凍結フラグの保存に失敗しました".to_string()))
}

/// 予算期間一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `team_id` - チームIDフィルター（Noneの場合は全チーム）
///
/// # 戻り値
/// 予算期間のリスト（年月の降順）、または失敗時はエラー
pub fn find_all(conn: &Connection, team_id: Option<i64>) -> AppResult<Vec<BudgetPeriod>> {
    let query = "SELECT id, team_id, month, year, budget_amount, frozen, created_at, updated_at
         FROM budget_periods";

    let periods = if let Some(tid) = team_id {
        let mut stmt =
            conn.prepare(&format!("{query} WHERE team_id = ?1 ORDER BY year DESC, month DESC"))?;
        let rows = stmt.query_map([tid], row_to_period)?;
        rows.collect::<Result<Vec<_>, _>>()
    } else {
        let mut stmt = conn.prepare(&format!("{query} ORDER BY year DESC, month DESC"))?;
        let rows = stmt.query_map([], row_to_period)?;
        rows.collect::<Result<Vec<_>, _>>()
    };

    periods.map_err(|e| AppError::Database(e.to_string()))
}

/// 指定期間の承認済み支出合計を算出する
///
/// # 引数
/// * `conn` - データベース接続
/// * `team_id` - チームID
/// * `month` - 月（1〜12）
/// * `year` - 年
///
/// # 戻り値
/// 承認済み経費の合計金額、または失敗時はエラー
///
/// 集計値はキャッシュせず、読み取りのたびに承認済み経費から算出する。
pub fn approved_spend(conn: &Connection, team_id: i64, month: i64, year: i64) -> AppResult<f64> {
    let prefix = format!("{year:04}-{month:02}%");
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM expenses
         WHERE team_id = ?1 AND status = 'APPROVED' AND date LIKE ?2",
        params![team_id, prefix],
        |row| row.get(0),
    )?;

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::db::initialize_schema;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn
    }

    fn insert_expense(conn: &Connection, team_id: i64, date: &str, amount: f64, status: &str) {
        conn.execute(
            "INSERT INTO expenses (title, amount, category, date, owner_id, team_id, status, created_at, updated_at)
             VALUES ('テスト', ?1, '交通費', ?2, 1, ?3, ?4, '', '')",
            params![amount, date, team_id, status],
        )
        .unwrap();
    }

    #[test]
    fn test_upsert_budget_creates_and_updates() {
        let conn = create_test_db();

        let period = upsert_budget(&conn, 1, 3, 2024, 2000.0).unwrap();
        assert_eq!(period.budget_amount, 2000.0);
        assert!(!period.frozen);

        // 同一期間への再設定は更新になる（一意制約違反にならない）
        let updated = upsert_budget(&conn, 1, 3, 2024, 5000.0).unwrap();
        assert_eq!(updated.id, period.id);
        assert_eq!(updated.budget_amount, 5000.0);
    }

    #[test]
    fn test_set_frozen_is_idempotent() {
        let conn = create_test_db();

        // 2回連続で凍結しても結果は1回の凍結と同じ
        let first = set_frozen(&conn, 1, 3, 2024, true).unwrap();
        let second = set_frozen(&conn, 1, 3, 2024, true).unwrap();
        assert!(first.frozen);
        assert!(second.frozen);
        assert_eq!(first.id, second.id);

        // 解除も冪等
        let unfrozen = set_frozen(&conn, 1, 3, 2024, false).unwrap();
        assert!(!unfrozen.frozen);
        let unfrozen_again = set_frozen(&conn, 1, 3, 2024, false).unwrap();
        assert!(!unfrozen_again.frozen);
    }

    #[test]
    fn test_set_frozen_preserves_budget_amount() {
        let conn = create_test_db();

        upsert_budget(&conn, 1, 3, 2024, 2000.0).unwrap();
        let frozen = set_frozen(&conn, 1, 3, 2024, true).unwrap();

        // 凍結しても予算額は変わらない
        assert_eq!(frozen.budget_amount, 2000.0);
    }

    #[test]
    fn test_approved_spend_counts_approved_only() {
        let conn = create_test_db();

        insert_expense(&conn, 1, "2024-03-10", 1000.0, "APPROVED");
        insert_expense(&conn, 1, "2024-03-15", 800.0, "APPROVED");
        insert_expense(&conn, 1, "2024-03-20", 500.0, "PENDING");
        insert_expense(&conn, 1, "2024-03-25", 300.0, "REJECTED");
        // 他チーム・他月は含まれない
        insert_expense(&conn, 2, "2024-03-10", 9999.0, "APPROVED");
        insert_expense(&conn, 1, "2024-04-01", 9999.0, "APPROVED");

        let spend = approved_spend(&conn, 1, 3, 2024).unwrap();
        assert_eq!(spend, 1800.0);
    }

    #[test]
    fn test_approved_spend_is_zero_without_expenses() {
        let conn = create_test_db();
        assert_eq!(approved_spend(&conn, 1, 3, 2024).unwrap(), 0.0);
    }

    #[test]
    fn test_find_all_filters_by_team() {
        let conn = create_test_db();

        upsert_budget(&conn, 1, 3, 2024, 2000.0).unwrap();
        upsert_budget(&conn, 1, 4, 2024, 2000.0).unwrap();
        upsert_budget(&conn, 2, 3, 2024, 3000.0).unwrap();

        assert_eq!(find_all(&conn, Some(1)).unwrap().len(), 2);
        assert_eq!(find_all(&conn, None).unwrap().len(), 3);
    }
}
