use crate::features::expenses::models::{
    CreateExpenseDto, Expense, ExpenseFilter, ExpenseStatus, FraudFlag,
};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::get_current_jst_timestamp;
use rusqlite::{params, Connection, Row};

const EXPENSE_COLUMNS: &str = "id, title, amount, category, date, description, owner_id, team_id,
    status, rejection_reason, fraud_score, fraud_reason, receipt_url, created_at, updated_at";

/// 行から経費を組み立てる
///
/// fraud_score/fraud_reasonの2カラムからFraudFlagを組み立てる
/// （スコアが設定されている場合のみフラグあり）。
fn row_to_expense(row: &Row) -> rusqlite::Result<Expense> {
    let fraud_score: Option<f64> = row.get(10)?;
    let fraud_reason: Option<String> = row.get(11)?;
    let fraud_flag = fraud_score.map(|confidence_score| FraudFlag {
        confidence_score,
        reason: fraud_reason.unwrap_or_default(),
    });

    Ok(Expense {
        id: row.get(0)?,
        title: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        date: row.get(4)?,
        description: row.get(5)?,
        owner_id: row.get(6)?,
        team_id: row.get(7)?,
        status: row.get(8)?,
        rejection_reason: row.get(9)?,
        fraud_flag,
        receipt_url: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// 経費を作成する（初期状態はPENDING）
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - 経費作成用DTO
/// * `owner_id` - 所有者のユーザーID
/// * `team_id` - 所有者のチームID
///
/// # 戻り値
/// 作成された経費、または失敗時はエラー
pub fn create(
    conn: &Connection,
    dto: &CreateExpenseDto,
    owner_id: i64,
    team_id: i64,
) -> AppResult<Expense> {
    let now = get_current_jst_timestamp();

    conn.execute(
        "INSERT INTO expenses (title, amount, category, date, description, owner_id, team_id,
            status, receipt_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'PENDING', ?8, ?9, ?10)",
        params![
            dto.title,
            dto.amount,
            dto.category,
            dto.date,
            dto.description,
            owner_id,
            team_id,
            dto.receipt_url,
            now,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)
}

/// IDで経費を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 経費ID
///
/// # 戻り値
/// 経費、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Expense> {
    conn.query_row(
        &format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1"),
        params![id],
        row_to_expense,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::not_found("経費"),
        _ => AppError::Database(e.to_string()),
    })
}

/// 経費一覧を取得する（フィルター指定可能）
///
/// # 引数
/// * `conn` - データベース接続
/// * `filter` - 検索フィルター（チーム・所有者・状態・日付範囲）
///
/// # 戻り値
/// 経費のリスト（日付の降順）、または失敗時はエラー
pub fn find_all(conn: &Connection, filter: &ExpenseFilter) -> AppResult<Vec<Expense>> {
    let mut query = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE 1 = 1");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    // チームフィルター
    if let Some(team_id) = filter.team_id {
        query.push_str(" AND team_id = ?");
        params.push(Box::new(team_id));
    }

    // 所有者フィルター
    if let Some(owner_id) = filter.owner_id {
        query.push_str(" AND owner_id = ?");
        params.push(Box::new(owner_id));
    }

    // 状態フィルター
    if let Some(status) = filter.status {
        query.push_str(" AND status = ?");
        params.push(Box::new(status.as_str().to_string()));
    }

    // 日付範囲フィルター（両端を含む）
    if let Some(from) = &filter.date_from {
        query.push_str(" AND date >= ?");
        params.push(Box::new(from.clone()));
    }
    if let Some(to) = &filter.date_to {
        query.push_str(" AND date <= ?");
        params.push(Box::new(to.clone()));
    }

    query.push_str(" ORDER BY date DESC");

    let mut stmt = conn.prepare(&query)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let expenses = stmt.query_map(param_refs.as_slice(), row_to_expense)?;

    expenses
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// 承認待ちの経費を承認済みにする
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 経費ID
///
/// # 戻り値
/// 遷移した場合はtrue、対象がPENDINGでなかった場合はfalse
///
/// WHERE句でPENDINGに限定することで、終了状態への遷移を
/// 高々1回に保つ（後着の遷移は空振りする）。
pub fn mark_approved(conn: &Connection, id: i64) -> AppResult<bool> {
    let now = get_current_jst_timestamp();

    let affected_rows = conn.execute(
        "UPDATE expenses SET status = 'APPROVED', updated_at = ?1
         WHERE id = ?2 AND status = 'PENDING'",
        params![now, id],
    )?;

    Ok(affected_rows > 0)
}

/// 承認待ちの経費を却下する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 経費ID
/// * `reason` - 却下理由
///
/// # 戻り値
/// 遷移した場合はtrue、対象がPENDINGでなかった場合はfalse
pub fn mark_rejected(conn: &Connection, id: i64, reason: &str) -> AppResult<bool> {
    let now = get_current_jst_timestamp();

    let affected_rows = conn.execute(
        "UPDATE expenses SET status = 'REJECTED', rejection_reason = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'PENDING'",
        params![reason, now, id],
    )?;

    Ok(affected_rows > 0)
}

/// 経費の内容を更新する（状態は変更しない）
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 経費ID
/// * `title`/`amount`/`category`/`date`/`description`/`receipt_url` - 更新後の値
///
/// # 戻り値
/// 更新された経費、または失敗時はエラー
#[allow(clippy::too_many_arguments)]
pub fn update_fields(
    conn: &Connection,
    id: i64,
    title: &str,
    amount: f64,
    category: &str,
    date: &str,
    description: Option<&str>,
    receipt_url: Option<&str>,
) -> AppResult<Expense> {
    let now = get_current_jst_timestamp();

    let affected_rows = conn.execute(
        "UPDATE expenses SET title = ?1, amount = ?2, category = ?3, date = ?4,
            description = ?5, receipt_url = ?6, updated_at = ?7
         WHERE id = ?8",
        params![title, amount, category, date, description, receipt_url, now, id],
    )?;

    if affected_rows == 0 {
        return Err(AppError::not_found("経費"));
    }

    find_by_id(conn, id)
}

/// 経費に不正検知フラグを設定する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 経費ID
/// * `confidence_score` - 不正の確度（0.0〜1.0）
/// * `reason` - フラグ付与の理由
///
/// # 戻り値
/// 更新された経費、または失敗時はエラー
pub fn set_fraud_flag(
    conn: &Connection,
    id: i64,
    confidence_score: f64,
    reason: &str,
) -> AppResult<Expense> {
    let now = get_current_jst_timestamp();

    let affected_rows = conn.execute(
        "UPDATE expenses SET fraud_score = ?1, fraud_reason = ?2, updated_at = ?3 WHERE id = ?4",
        params![confidence_score, reason, now, id],
    )?;

    if affected_rows == 0 {
        return Err(AppError::not_found("経費"));
    }

    find_by_id(conn, id)
}

/// 経費の不正検知フラグを解除する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 経費ID
///
/// # 戻り値
/// 更新された経費、または失敗時はエラー
pub fn clear_fraud_flag(conn: &Connection, id: i64) -> AppResult<Expense> {
    let now = get_current_jst_timestamp();

    let affected_rows = conn.execute(
        "UPDATE expenses SET fraud_score = NULL, fraud_reason = NULL, updated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;

    if affected_rows == 0 {
        return Err(AppError::not_found("経費"));
    }

    find_by_id(conn, id)
}

/// 不正検知フラグ付きの承認待ち経費一覧を取得する（不正レビューキュー）
///
/// # 引数
/// * `conn` - データベース接続
/// * `team_id` - チームIDフィルター（Noneの場合は全チーム）
///
/// # 戻り値
/// フラグ付き経費のリスト（確度の降順）、または失敗時はエラー
pub fn find_flagged(conn: &Connection, team_id: Option<i64>) -> AppResult<Vec<Expense>> {
    let base = format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses
         WHERE status = 'PENDING' AND fraud_score IS NOT NULL"
    );

    let expenses = if let Some(tid) = team_id {
        let mut stmt = conn.prepare(&format!("{base} AND team_id = ?1 ORDER BY fraud_score DESC"))?;
        let rows = stmt.query_map([tid], row_to_expense)?;
        rows.collect::<Result<Vec<_>, _>>()
    } else {
        let mut stmt = conn.prepare(&format!("{base} ORDER BY fraud_score DESC"))?;
        let rows = stmt.query_map([], row_to_expense)?;
        rows.collect::<Result<Vec<_>, _>>()
    };

    expenses.map_err(|e| AppError::Database(e.to_string()))
}

/// 経費を削除する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 経費ID
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let affected_rows = conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;

    if affected_rows == 0 {
        return Err(AppError::not_found("経費"));
    }

    Ok(())
}
