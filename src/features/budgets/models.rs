use serde::{Deserialize, Serialize};

/// 予算期間データモデル
///
/// (team_id, month, year)ごとに1レコード。
/// `budget_amount`が0の場合は「上限なし」を意味する番兵値であり、
/// 文字通りの0円上限ではない。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BudgetPeriod {
    pub id: i64,
    pub team_id: i64,
    /// 月（1〜12）
    pub month: i64,
    /// 年（例: 2024）
    pub year: i64,
    pub budget_amount: f64,
    /// 凍結フラグ（期間全体の単一トグル、カテゴリ別ではない）
    pub frozen: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// 期間チェックの結果
///
/// `spent_amount`は承認済み経費の合計から読み取り時に毎回算出される
/// （キャッシュした集計値の二重計上を避けるため）。
/// `exceeded`は単独では助言的な警告であり、申請を拒否するのは
/// ポリシーの月次上限か凍結フラグのみ。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PeriodStatus {
    pub frozen: bool,
    pub budget_amount: f64,
    pub spent_amount: f64,
    pub remaining: f64,
    pub exceeded: bool,
}

/// 予算超過の警告（助言的、申請はブロックしない）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BudgetWarning {
    pub current_spend: f64,
    pub limit: f64,
}
