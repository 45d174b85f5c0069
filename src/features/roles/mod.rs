/// ロール機能モジュール
///
/// ユーザーロールのモデルとアクセスゲート（操作可否の一元判定）を提供します。
pub mod gate;
pub mod models;

pub use gate::{can_act, can_administer};
pub use models::{Actor, ExpenseAction, Role};
