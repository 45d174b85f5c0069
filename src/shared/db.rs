use crate::shared::errors::AppResult;
use rusqlite::Connection;

/// データベーススキーマを初期化する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
///
/// すべてのCREATE文はIF NOT EXISTSで冪等に実行される。
pub fn initialize_schema(conn: &Connection) -> AppResult<()> {
    // 経費テーブル
    // statusはPENDING/APPROVED/REJECTEDのいずれか
    // rejection_reasonはREJECTEDのときのみ設定される
    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            amount REAL NOT NULL CHECK(amount >= 0),
            category TEXT NOT NULL,
            date TEXT NOT NULL,
            description TEXT,
            owner_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING'
                CHECK(status IN ('PENDING', 'APPROVED', 'REJECTED')),
            rejection_reason TEXT,
            fraud_score REAL CHECK(fraud_score IS NULL OR (fraud_score >= 0 AND fraud_score <= 1)),
            fraud_reason TEXT,
            receipt_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ポリシーテーブル
    // team_idがNULLの場合は全チーム対象（グローバルスコープ）
    // allowed_categoriesはJSON配列文字列（空配列 = 全カテゴリ許可）
    conn.execute(
        "CREATE TABLE IF NOT EXISTS policies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            team_id INTEGER,
            max_amount REAL,
            monthly_limit REAL,
            requires_receipt INTEGER NOT NULL DEFAULT 0,
            allowed_categories TEXT NOT NULL DEFAULT '[]',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // 予算期間テーブル
    // (team_id, month, year)ごとに1レコード
    // budget_amount = 0 は「上限なし」の意味
    conn.execute(
        "CREATE TABLE IF NOT EXISTS budget_periods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL,
            month INTEGER NOT NULL CHECK(month BETWEEN 1 AND 12),
            year INTEGER NOT NULL,
            budget_amount REAL NOT NULL DEFAULT 0 CHECK(budget_amount >= 0),
            frozen INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(team_id, month, year)
        )",
        [],
    )?;

    // カテゴリテーブル
    // allowed_roleはこのカテゴリで申請できる最低ロール
    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            color TEXT NOT NULL DEFAULT '#3B82F6',
            allowed_role TEXT NOT NULL DEFAULT 'USER'
                CHECK(allowed_role IN ('USER', 'MANAGER', 'ADMIN')),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // 監査ログテーブル（追記専用）
    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            actor_id INTEGER NOT NULL,
            action TEXT NOT NULL,
            entity TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            detail TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // 検索用インデックス
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_team_date ON expenses(team_id, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_status ON expenses(status)",
        [],
    )?;

    log::debug!("データベーススキーマを初期化しました");

    Ok(())
}
