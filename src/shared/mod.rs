/// 共有モジュール
///
/// 機能モジュール間で共有されるコード（エラー型、設定、データベース初期化、
/// バリデーション、二重実行ガード）を提供します。
pub mod config;
pub mod db;
pub mod errors;
pub mod in_flight;
pub mod utils;
