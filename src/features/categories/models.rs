use crate::features::roles::Role;
use serde::{Deserialize, Serialize};

/// カテゴリデータモデル
///
/// `allowed_role`はこのカテゴリで経費を申請できる最低ロール。
/// 一般ユーザーには`allowed_role`がUSERのカテゴリのみ表示される。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub allowed_role: Role,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Category {
    /// 指定ロールの申請者がこのカテゴリを利用できるかを判定
    ///
    /// # 引数
    /// * `role` - 申請者のロール
    ///
    /// # 戻り値
    /// 利用できる場合はtrue（非アクティブなカテゴリは常にfalse)
    pub fn is_visible_to(&self, role: Role) -> bool {
        self.is_active && role.permits(self.allowed_role)
    }
}

/// カテゴリ作成用DTO
#[derive(Debug, Deserialize)]
pub struct CreateCategoryDto {
    pub name: String,
    pub color: Option<String>,
    pub allowed_role: Option<Role>,
}

/// カテゴリ更新用DTO
#[derive(Debug, Deserialize)]
pub struct UpdateCategoryDto {
    pub name: Option<String>,
    pub color: Option<String>,
    pub allowed_role: Option<Role>,
    pub is_active: Option<bool>,
}
