use log::warn;
use serde::{Deserialize, Serialize};

/// アプリケーション共通の結果型
pub type AppResult<T> = Result<T, AppError>;

/// ポリシー違反の詳細
///
/// バリデーションは違反を1件ずつ返さず、該当したルールをすべて集めて返す。
/// 呼び出し側（画面）が全件をまとめて表示できるようにするため。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PolicyViolation {
    /// 1件あたりの上限金額を超過
    MaxAmountExceeded { limit: f64, amount: f64 },

    /// 月次上限を超過（既存承認済み支出 + 申請額）
    MonthlyLimitExceeded { limit: f64, projected: f64 },

    /// 領収書の添付が必須
    ReceiptRequired,

    /// 許可されていないカテゴリ
    CategoryNotAllowed { category: String },
}

/// アプリケーション共通エラー
///
/// すべて回復可能なエラーとして扱い、画面にメッセージとして表示する。
/// パニックさせるための型ではない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum AppError {
    /// 権限エラー（アクセスゲートによる拒否）
    #[error("権限がありません: {0}")]
    PermissionDenied(String),

    /// 凍結期間エラー（凍結された月への申請・編集）
    #[error("対象期間は凍結されています: {0}")]
    PeriodFrozen(String),

    /// ポリシー違反（違反したルールの一覧を保持）
    #[error("ポリシー違反が{}件あります", .0.len())]
    PolicyViolation(Vec<PolicyViolation>),

    /// 不正な状態遷移（終了状態の経費への操作など）
    #[error("不正な状態遷移です: {0}")]
    InvalidTransition(String),

    /// バリデーションエラー（必須項目の欠落など）
    #[error("入力エラー: {0}")]
    Validation(String),

    /// 対象が見つからない
    #[error("{0}が見つかりません")]
    NotFound(String),

    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(String),

    /// 通信エラー（外部APIとの通信失敗）
    ///
    /// 通信失敗は「操作は行われなかった」として扱う。自動リトライはしない。
    #[error("通信エラー: {0}")]
    Transport(String),

    /// 設定エラー
    #[error("設定エラー: {0}")]
    Configuration(String),
}

impl AppError {
    /// 権限エラーを作成
    pub fn permission_denied<S: Into<String>>(message: S) -> Self {
        let msg = message.into();
        warn!("権限エラーが発生: {msg}");
        Self::PermissionDenied(msg)
    }

    /// 凍結期間エラーを作成
    pub fn period_frozen<S: Into<String>>(message: S) -> Self {
        let msg = message.into();
        warn!("凍結期間への操作を拒否: {msg}");
        Self::PeriodFrozen(msg)
    }

    /// 不正な状態遷移エラーを作成
    pub fn invalid_transition<S: Into<String>>(message: S) -> Self {
        let msg = message.into();
        warn!("不正な状態遷移を拒否: {msg}");
        Self::InvalidTransition(msg)
    }

    /// バリデーションエラーを作成
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// NotFoundエラーを作成
    pub fn not_found<S: Into<String>>(entity: S) -> Self {
        Self::NotFound(entity.into())
    }

    /// 通信エラーを作成
    pub fn transport<S: Into<String>>(message: S) -> Self {
        let msg = message.into();
        warn!("通信エラーが発生: {msg}");
        Self::Transport(msg)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::not_found("対象レコード"),
            _ => AppError::Database(e.to_string()),
        }
    }
}
