/// 設定モジュール
///
/// 環境変数の読み込みとログシステムの初期化を提供します。
pub mod environment;
