use serde::{Deserialize, Serialize};

/// 経費ポリシーデータモデル
///
/// 支出制約の束（上限金額・月次上限・領収書要否・カテゴリ制限）。
/// `team_id`がNoneの場合は全チーム対象（グローバルスコープ）。
/// 非アクティブなポリシーは申請を一切ゲートしない。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Policy {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub team_id: Option<i64>,
    pub max_amount: Option<f64>,
    pub monthly_limit: Option<f64>,
    pub requires_receipt: bool,
    /// 許可カテゴリ（空 = 全カテゴリ許可）
    pub allowed_categories: Vec<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Policy {
    /// このポリシーが指定チームの申請に適用されるかを判定
    ///
    /// # 引数
    /// * `team_id` - 申請のチームID
    ///
    /// # 戻り値
    /// 適用される場合はtrue（非アクティブなポリシーは常にfalse）
    pub fn applies_to_team(&self, team_id: i64) -> bool {
        self.is_active && (self.team_id.is_none() || self.team_id == Some(team_id))
    }

    /// このポリシーがカテゴリを制限しているかを判定
    pub fn restricts_categories(&self) -> bool {
        !self.allowed_categories.is_empty()
    }

    /// このポリシーの上限が指定カテゴリの申請に及ぶかを判定
    ///
    /// カテゴリ制限を持つポリシーは、制限リストに含まれるカテゴリの
    /// 申請のみを対象とする。制限なしのポリシーは全カテゴリが対象。
    pub fn bounds_category(&self, category: &str) -> bool {
        self.allowed_categories.is_empty()
            || self.allowed_categories.iter().any(|c| c == category)
    }
}

/// ポリシー作成用DTO
#[derive(Debug, Deserialize)]
pub struct CreatePolicyDto {
    pub name: String,
    pub description: Option<String>,
    pub team_id: Option<i64>,
    pub max_amount: Option<f64>,
    pub monthly_limit: Option<f64>,
    pub requires_receipt: bool,
    pub allowed_categories: Vec<String>,
}

/// ポリシー更新用DTO
#[derive(Debug, Deserialize)]
pub struct UpdatePolicyDto {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_amount: Option<f64>,
    pub monthly_limit: Option<f64>,
    pub requires_receipt: Option<bool>,
    pub allowed_categories: Option<Vec<String>>,
    pub is_active: Option<bool>,
}
