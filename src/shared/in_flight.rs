use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// 実行中操作のレジストリ
///
/// 同一エンティティへの同一操作（承認ボタンの二度押しなど）が
/// 前の操作の完了前に再実行されるのを防ぐ。
/// 操作開始時に`begin`でガードを取得し、ガードのドロップで解放される。
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    inner: Arc<Mutex<HashSet<String>>>,
}

/// 実行中操作のガード
///
/// ドロップされると対応するキーがレジストリから解放される。
#[derive(Debug)]
pub struct InFlightGuard {
    key: String,
    inner: Arc<Mutex<HashSet<String>>>,
}

impl InFlightRegistry {
    /// 新しいレジストリを作成
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// 操作の開始を登録する
    ///
    /// # 引数
    /// * `operation` - 操作名（"approve"、"submit"など）
    /// * `entity_id` - 対象エンティティのID
    ///
    /// # 戻り値
    /// 登録できた場合はガード、同一操作が実行中の場合はNone
    pub fn begin(&self, operation: &str, entity_id: i64) -> Option<InFlightGuard> {
        let key = format!("{operation}:{entity_id}");
        let mut set = self.inner.lock().ok()?;

        if !set.insert(key.clone()) {
            log::warn!("操作が既に実行中のため拒否しました: {key}");
            return None;
        }

        Some(InFlightGuard {
            key,
            inner: Arc::clone(&self.inner),
        })
    }

    /// 指定した操作が実行中かどうかを判定
    ///
    /// # 引数
    /// * `operation` - 操作名
    /// * `entity_id` - 対象エンティティのID
    ///
    /// # 戻り値
    /// 実行中の場合はtrue
    pub fn is_in_flight(&self, operation: &str, entity_id: i64) -> bool {
        let key = format!("{operation}:{entity_id}");
        self.inner
            .lock()
            .map(|set| set.contains(&key))
            .unwrap_or(false)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.inner.lock() {
            set.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_registers_operation() {
        let registry = InFlightRegistry::new();

        let guard = registry.begin("approve", 1);
        assert!(guard.is_some());
        assert!(registry.is_in_flight("approve", 1));
    }

    #[test]
    fn test_duplicate_begin_is_rejected() {
        let registry = InFlightRegistry::new();

        // 同一操作の二重開始は拒否される（二度押しガード）
        let _guard = registry.begin("approve", 1).unwrap();
        assert!(registry.begin("approve", 1).is_none());

        // 別のエンティティや別の操作は影響を受けない
        assert!(registry.begin("approve", 2).is_some());
        assert!(registry.begin("reject", 1).is_some());
    }

    #[test]
    fn test_guard_drop_releases_operation() {
        let registry = InFlightRegistry::new();

        {
            let _guard = registry.begin("submit", 10).unwrap();
            assert!(registry.is_in_flight("submit", 10));
        }

        // ガードのドロップ後は再度開始できる
        assert!(!registry.is_in_flight("submit", 10));
        assert!(registry.begin("submit", 10).is_some());
    }

    #[test]
    fn test_registry_is_shared_between_clones() {
        let registry = InFlightRegistry::new();
        let cloned = registry.clone();

        let _guard = registry.begin("approve", 1).unwrap();
        // クローン間で状態が共有される
        assert!(cloned.is_in_flight("approve", 1));
        assert!(cloned.begin("approve", 1).is_none());
    }
}
