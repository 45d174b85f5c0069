/// 経費機能モジュール
///
/// 経費のライフサイクル（申請 → 承認/却下）を提供します。
/// 承認・却下は終了状態であり、以降の状態遷移は行われません。
pub mod models;
pub mod repository;
pub mod service;

pub use models::{
    CreateExpenseDto, Expense, ExpenseFilter, ExpenseStatus, FraudFlag, SubmitOutcome,
    UpdateExpenseDto,
};
pub use service::{approve, edit, find_all, reject, remove, submit};
