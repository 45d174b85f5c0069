/// 監査ログ機能モジュール
///
/// 追跡対象の操作（承認・却下・凍結・ポリシー変更・不正フラグ解除）を
/// 追記専用で記録します。
pub mod models;
pub mod repository;

pub use models::AuditEntry;
