use crate::features::budgets::BudgetWarning;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// 経費のライフサイクル状態
///
/// PENDINGが初期状態。APPROVED/REJECTEDは終了状態であり、
/// 以降の状態遷移は行われない（修正は新しい申請として行う）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExpenseStatus {
    /// 承認待ち（初期状態）
    Pending,
    /// 承認済み（終了状態）
    Approved,
    /// 却下（終了状態）
    Rejected,
}

impl ExpenseStatus {
    /// データベース格納用の文字列表現を取得
    pub fn as_str(self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "PENDING",
            ExpenseStatus::Approved => "APPROVED",
            ExpenseStatus::Rejected => "REJECTED",
        }
    }

    /// 文字列表現から状態を解析する
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ExpenseStatus::Pending),
            "APPROVED" => Some(ExpenseStatus::Approved),
            "REJECTED" => Some(ExpenseStatus::Rejected),
            _ => None,
        }
    }

    /// 終了状態（承認済みまたは却下）かどうかを判定
    pub fn is_terminal(self) -> bool {
        matches!(self, ExpenseStatus::Approved | ExpenseStatus::Rejected)
    }
}

impl FromSql for ExpenseStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| ExpenseStatus::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

impl ToSql for ExpenseStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// 不正検知フラグ
///
/// 外部のスコアリング機構が承認待ちの経費に付与するメタデータ。
/// `confidence_score`は助言的な情報であり、状態遷移を自動的に
/// 引き起こすことはない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudFlag {
    /// 不正の確度（0.0〜1.0）
    pub confidence_score: f64,
    /// フラグ付与の理由
    pub reason: String,
}

/// 経費データモデル
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Expense {
    pub id: i64,
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub date: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub team_id: i64,
    pub status: ExpenseStatus,
    /// 却下理由（status = REJECTEDのときのみ設定される）
    pub rejection_reason: Option<String>,
    /// 不正検知フラグ（付与されている間は承認経路が閉じる）
    pub fraud_flag: Option<FraudFlag>,
    /// 領収書への参照（不透明な文字列。形式は保管層が決める）
    pub receipt_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Expense {
    /// 不正フラグが付与されているかを判定
    pub fn is_flagged(&self) -> bool {
        self.fraud_flag.is_some()
    }
}

/// 経費作成用DTO
///
/// 所有者とチームはDTOではなく操作主体（Actor）から決まる。
#[derive(Debug, Deserialize)]
pub struct CreateExpenseDto {
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub date: String,
    pub description: Option<String>,
    pub receipt_url: Option<String>,
}

/// 経費更新用DTO（承認待ちの間のみ適用可能）
#[derive(Debug, Deserialize)]
pub struct UpdateExpenseDto {
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub receipt_url: Option<String>,
}

/// 経費一覧の検索フィルター
#[derive(Debug, Default, Deserialize)]
pub struct ExpenseFilter {
    pub team_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub status: Option<ExpenseStatus>,
    /// 日付範囲の開始（YYYY-MM-DD、この日を含む）
    pub date_from: Option<String>,
    /// 日付範囲の終了（YYYY-MM-DD、この日を含む）
    pub date_to: Option<String>,
}

/// 申請結果
///
/// `budget_warning`は予算超過の助言的な警告であり、
/// 設定されていても申請自体は成立している。
#[derive(Debug, Serialize)]
pub struct SubmitOutcome {
    pub expense: Expense,
    pub budget_warning: Option<BudgetWarning>,
}
