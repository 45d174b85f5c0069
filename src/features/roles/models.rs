use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// ユーザーロール
///
/// 権限順に USER < MANAGER < ADMIN。
/// ただしMANAGERはADMIN専用の管理操作（ポリシー・カテゴリ・予算の管理）を継承しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// 一般ユーザー（自分の経費の申請のみ）
    User,
    /// マネージャー（自チームの経費の承認・却下）
    Manager,
    /// 管理者（全チームの承認・却下と管理操作）
    Admin,
}

impl Role {
    /// 権限の強さを数値で取得（比較用）
    fn rank(self) -> u8 {
        match self {
            Role::User => 0,
            Role::Manager => 1,
            Role::Admin => 2,
        }
    }

    /// このロールが要求ロール以上の権限を持つかを判定
    ///
    /// # 引数
    /// * `required` - 要求される最低ロール
    ///
    /// # 戻り値
    /// 権限を満たす場合はtrue
    pub fn permits(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// データベース格納用の文字列表現を取得
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        }
    }

    /// 文字列表現からロールを解析する
    ///
    /// # 引数
    /// * `s` - ロール文字列（"USER"/"MANAGER"/"ADMIN"）
    ///
    /// # 戻り値
    /// 該当するロール、不明な文字列の場合はNone
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(Role::User),
            "MANAGER" => Some(Role::Manager),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| Role::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// 操作主体（ログイン中のユーザー）
///
/// ルールロジックはグローバルな「現在のユーザー」を参照せず、
/// 常にこの構造体を引数として受け取る。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// ユーザーID
    pub id: i64,
    /// ロール
    pub role: Role,
    /// 所属チームID（マネージャーのチーム判定に使用）
    pub team_id: Option<i64>,
}

impl Actor {
    /// 新しい操作主体を作成
    pub fn new(id: i64, role: Role, team_id: Option<i64>) -> Self {
        Self { id, role, team_id }
    }
}

/// 経費に対する操作の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseAction {
    /// 新規申請
    Create,
    /// 申請内容の編集
    Edit,
    /// 承認
    Approve,
    /// 却下
    Reject,
    /// 不正フラグ付き経費の強制却下
    Terminate,
    /// 削除
    Delete,
}

impl ExpenseAction {
    /// 監査ログに記録する操作名を取得
    pub fn as_str(self) -> &'static str {
        match self {
            ExpenseAction::Create => "create",
            ExpenseAction::Edit => "edit",
            ExpenseAction::Approve => "approve",
            ExpenseAction::Reject => "reject",
            ExpenseAction::Terminate => "terminate",
            ExpenseAction::Delete => "delete",
        }
    }
}
