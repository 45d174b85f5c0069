// 機能別モジュール構造
pub mod features;
pub mod shared;

use log::info;
use rusqlite::Connection;
use shared::config::environment::{initialize_logging_system, load_environment_variables};
use shared::db::initialize_schema;
use shared::errors::AppResult;
use shared::in_flight::InFlightRegistry;
use std::path::Path;
use std::sync::Mutex;

/// アプリケーション状態
///
/// データベース接続と実行中操作のレジストリを保持する。
/// 接続はMutexで保護され、すべての操作は接続ロックの下で直列化される。
pub struct AppState {
    pub db: Mutex<Connection>,
    pub in_flight: InFlightRegistry,
}

impl AppState {
    /// 指定パスのデータベースでアプリケーション状態を初期化する
    ///
    /// # 引数
    /// * `db_path` - データベースファイルのパス
    ///
    /// # 戻り値
    /// 初期化済みのアプリケーション状態、または失敗時はエラー
    ///
    /// 環境変数の読み込みとロギングの初期化もここで行う（再呼び出しは安全）。
    pub fn new<P: AsRef<Path>>(db_path: P) -> AppResult<Self> {
        load_environment_variables();
        initialize_logging_system();

        let conn = Connection::open(db_path)?;
        initialize_schema(&conn)?;
        info!("アプリケーション状態を初期化しました");

        Ok(AppState {
            db: Mutex::new(conn),
            in_flight: InFlightRegistry::new(),
        })
    }

    /// インメモリデータベースでアプリケーション状態を初期化する（テスト用途）
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;

        Ok(AppState {
            db: Mutex::new(conn),
            in_flight: InFlightRegistry::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use features::roles::{Actor, Role};

    #[test]
    fn test_in_memory_state_is_usable() {
        let state = AppState::in_memory().unwrap();
        let conn = state.db.lock().unwrap();

        let categories = features::categories::repository::find_all(&conn, false).unwrap();
        assert!(categories.is_empty());
    }

    #[test]
    fn test_new_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("keihi.db");

        {
            let state = AppState::new(&db_path).unwrap();
            let conn = state.db.lock().unwrap();
            features::categories::service::create(
                &conn,
                &Actor::new(1, Role::Admin, None),
                features::categories::CreateCategoryDto {
                    name: "交通費".to_string(),
                    color: None,
                    allowed_role: None,
                },
            )
            .unwrap();
        }

        // 再オープンしてもデータが残っている（スキーマ初期化は冪等）
        let state = AppState::new(&db_path).unwrap();
        let conn = state.db.lock().unwrap();
        let categories = features::categories::repository::find_all(&conn, false).unwrap();
        assert_eq!(categories.len(), 1);
    }
}
