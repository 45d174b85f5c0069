/// 予算機能モジュール
///
/// チーム×月ごとの予算台帳と凍結コントローラーを提供します。
/// 凍結は新規の支出をブロックし、承認待ちの経費の審査はブロックしません。
pub mod models;
pub mod repository;
pub mod service;

pub use models::{BudgetPeriod, BudgetWarning, PeriodStatus};
pub use service::{check_period, ensure_not_frozen, freeze_period, set_budget, unfreeze_period};
