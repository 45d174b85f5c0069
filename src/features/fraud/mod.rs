/// 不正検知ゲート機能モジュール
///
/// 外部スコアリング機構がフラグを付与した経費の並行審査キューを
/// 提供します。フラグ付きの経費に許可される遷移は強制却下と
/// フラグ解除（管理者のみ）に限定されます。
pub mod service;

pub use service::{clear_flag, find_flagged, flag, terminate};
