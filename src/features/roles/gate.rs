use crate::features::roles::models::{Actor, ExpenseAction, Role};
use crate::shared::errors::{AppError, AppResult};

/// 経費に対する操作の可否を判定する（アクセスゲート）
///
/// 画面ごとに分散していたロール判定の唯一の置き場所。
/// すべての画面・コマンドはこの関数を通して権限を確認する。
///
/// # 引数
/// * `actor` - 操作主体
/// * `owner_id` - 対象経費の所有者ID
/// * `team_id` - 対象経費のチームID
/// * `action` - 実行しようとしている操作
///
/// # 戻り値
/// 許可される場合はOk(())、拒否される場合はPermissionDenied
///
/// # 判定規則
/// - 申請・編集: 本人のみ
/// - 削除: 本人または管理者
/// - 承認・却下・強制却下: 自分の経費には不可（自己承認の禁止は固定の不変条件）。
///   マネージャーは自チームのみ、管理者は全チーム、一般ユーザーは不可。
pub fn can_act(actor: &Actor, owner_id: i64, team_id: i64, action: ExpenseAction) -> AppResult<()> {
    match action {
        ExpenseAction::Create | ExpenseAction::Edit => {
            if actor.id != owner_id {
                return Err(AppError::permission_denied(
                    "他のユーザー名義の経費は操作できません",
                ));
            }
            Ok(())
        }

        ExpenseAction::Delete => {
            if actor.id == owner_id || actor.role == Role::Admin {
                Ok(())
            } else {
                Err(AppError::permission_denied(
                    "自分の経費または管理者のみ削除できます",
                ))
            }
        }

        ExpenseAction::Approve | ExpenseAction::Reject | ExpenseAction::Terminate => {
            // 自己承認の禁止（ロールに関わらず最優先で判定）
            if actor.id == owner_id {
                return Err(AppError::permission_denied(
                    "自分の経費を承認・却下することはできません",
                ));
            }

            match actor.role {
                Role::Admin => Ok(()),
                Role::Manager => {
                    if actor.team_id == Some(team_id) {
                        Ok(())
                    } else {
                        Err(AppError::permission_denied(
                            "マネージャーは自チームの経費のみ承認・却下できます",
                        ))
                    }
                }
                Role::User => Err(AppError::permission_denied(
                    "経費の承認・却下にはマネージャー以上の権限が必要です",
                )),
            }
        }
    }
}

/// 管理操作（ポリシー・カテゴリ・予算・凍結・不正フラグ解除）の可否を判定する
///
/// # 引数
/// * `actor` - 操作主体
///
/// # 戻り値
/// 管理者の場合はOk(())、それ以外はPermissionDenied
///
/// マネージャーは承認権限を持つが、管理操作は継承しない。
pub fn can_administer(actor: &Actor) -> AppResult<()> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::permission_denied(
            "この操作には管理者権限が必要です",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, team: i64) -> Actor {
        Actor::new(id, Role::User, Some(team))
    }

    fn manager(id: i64, team: i64) -> Actor {
        Actor::new(id, Role::Manager, Some(team))
    }

    fn admin(id: i64) -> Actor {
        Actor::new(id, Role::Admin, None)
    }

    #[test]
    fn test_create_is_allowed_for_self_only() {
        // 本人名義の申請は全ロールで可能
        assert!(can_act(&user(1, 1), 1, 1, ExpenseAction::Create).is_ok());
        assert!(can_act(&manager(2, 1), 2, 1, ExpenseAction::Create).is_ok());
        assert!(can_act(&admin(3), 3, 1, ExpenseAction::Create).is_ok());

        // 他人名義の申請は不可
        let result = can_act(&admin(3), 1, 1, ExpenseAction::Create);
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }

    #[test]
    fn test_self_approval_is_always_denied() {
        // 自己承認の禁止はロールに関わらず適用される
        for actor in [manager(1, 1), admin(1)] {
            let result = can_act(&actor, 1, 1, ExpenseAction::Approve);
            assert!(matches!(result, Err(AppError::PermissionDenied(_))));

            let result = can_act(&actor, 1, 1, ExpenseAction::Reject);
            assert!(matches!(result, Err(AppError::PermissionDenied(_))));
        }
    }

    #[test]
    fn test_manager_can_review_own_team_only() {
        let actor = manager(10, 1);

        // 自チームの経費は承認・却下可能
        assert!(can_act(&actor, 1, 1, ExpenseAction::Approve).is_ok());
        assert!(can_act(&actor, 1, 1, ExpenseAction::Reject).is_ok());

        // 他チームの経費は不可
        let result = can_act(&actor, 1, 2, ExpenseAction::Approve);
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }

    #[test]
    fn test_admin_can_review_any_team() {
        let actor = admin(10);
        assert!(can_act(&actor, 1, 1, ExpenseAction::Approve).is_ok());
        assert!(can_act(&actor, 2, 99, ExpenseAction::Reject).is_ok());
        assert!(can_act(&actor, 3, 5, ExpenseAction::Terminate).is_ok());
    }

    #[test]
    fn test_plain_user_cannot_review() {
        let actor = user(10, 1);
        let result = can_act(&actor, 1, 1, ExpenseAction::Approve);
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }

    #[test]
    fn test_delete_is_allowed_for_owner_or_admin() {
        assert!(can_act(&user(1, 1), 1, 1, ExpenseAction::Delete).is_ok());
        assert!(can_act(&admin(9), 1, 1, ExpenseAction::Delete).is_ok());

        let result = can_act(&manager(5, 1), 1, 1, ExpenseAction::Delete);
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }

    #[test]
    fn test_can_administer_is_admin_only() {
        assert!(can_administer(&admin(1)).is_ok());
        assert!(matches!(
            can_administer(&manager(1, 1)),
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            can_administer(&user(1, 1)),
            Err(AppError::PermissionDenied(_))
        ));
    }
}
