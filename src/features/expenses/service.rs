use crate::features::audit;
use crate::features::budgets;
use crate::features::budgets::BudgetWarning;
use crate::features::categories;
use crate::features::expenses::models::{
    CreateExpenseDto, Expense, ExpenseFilter, ExpenseStatus, SubmitOutcome, UpdateExpenseDto,
};
use crate::features::expenses::repository;
use crate::features::policies;
use crate::features::roles::{can_act, Actor, ExpenseAction};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::in_flight::InFlightRegistry;
use crate::shared::utils::{
    validate_amount, validate_category, validate_date, validate_description,
    validate_required_field,
};
use rusqlite::Connection;

/// 申請内容の項目バリデーション
fn validate_draft_fields(
    title: &str,
    amount: f64,
    category: &str,
    date: &str,
    description: &Option<String>,
) -> AppResult<()> {
    validate_required_field(title, "タイトル")?;
    validate_amount(amount)?;
    validate_category(category)?;
    validate_date(date)?;
    validate_description(description)?;
    Ok(())
}

/// 経費を申請する
///
/// # 引数
/// * `conn` - データベース接続
/// * `in_flight` - 実行中操作のレジストリ（二度押しガード）
/// * `actor` - 操作主体（申請者本人）
/// * `dto` - 経費作成用DTO
///
/// # 戻り値
/// 申請結果（作成された経費と助言的な予算超過警告）、または失敗時はエラー
///
/// # 判定順序
/// 1. 項目バリデーション
/// 2. アクセスゲート（本人名義の申請か）
/// 3. カテゴリの利用可否（存在・アクティブ・ロール）
/// 4. 凍結チェック（凍結期間への申請はPeriodFrozen）
/// 5. ポリシーバリデーション（違反は全件まとめてPolicyViolation）
///
/// いずれかの段階で失敗した場合、レコードは一切作成されない。
/// 予算超過はポリシーの月次上限に抵触しない限り申請をブロックせず、
/// 警告として結果に添付される。
pub fn submit(
    conn: &Connection,
    in_flight: &InFlightRegistry,
    actor: &Actor,
    dto: CreateExpenseDto,
) -> AppResult<SubmitOutcome> {
    let _guard = in_flight
        .begin("submit", actor.id)
        .ok_or_else(|| AppError::validation("申請処理が実行中です"))?;

    validate_draft_fields(&dto.title, dto.amount, &dto.category, &dto.date, &dto.description)?;

    let team_id = actor
        .team_id
        .ok_or_else(|| AppError::validation("チームに所属していないため申請できません"))?;

    // アクセスゲート（申請は本人名義のみ）
    can_act(actor, actor.id, team_id, ExpenseAction::Create)?;

    // カテゴリの利用可否
    categories::service::ensure_usable(conn, &dto.category, actor.role)?;

    // 凍結チェック
    budgets::ensure_not_frozen(conn, team_id, &dto.date)?;

    // 予算状態の取得（承認済み支出は読み取り時に算出される）
    let period = budgets::check_period(conn, team_id, &dto.date, dto.amount)?;

    // ポリシーバリデーション
    let active_policies = policies::repository::find_active(conn)?;
    policies::validate(
        &active_policies,
        team_id,
        &dto.category,
        dto.amount,
        dto.receipt_url.is_some(),
        period.spent_amount,
    )?;

    let expense = repository::create(conn, &dto, actor.id, team_id)?;
    log::info!(
        "経費を申請しました: id={}, owner={}, amount={}",
        expense.id,
        actor.id,
        expense.amount
    );

    // 予算超過は助言的な警告であり、申請自体はブロックしない
    let budget_warning = if period.exceeded {
        log::warn!(
            "予算超過の警告: team={team_id}, spent={}, budget={}",
            period.spent_amount,
            period.budget_amount
        );
        Some(BudgetWarning {
            current_spend: period.spent_amount,
            limit: period.budget_amount,
        })
    } else {
        None
    };

    Ok(SubmitOutcome {
        expense,
        budget_warning,
    })
}

/// 経費を承認する
///
/// # 引数
/// * `conn` - データベース接続
/// * `in_flight` - 実行中操作のレジストリ
/// * `actor` - 操作主体（マネージャーまたは管理者）
/// * `id` - 経費ID
///
/// # 戻り値
/// 承認後の経費、または失敗時はエラー
///
/// 承認済みの経費への再承認はエラーではなく現在の状態を返す（冪等）。
/// 却下済みの経費への承認はInvalidTransition。
/// 不正フラグ付きの経費は通常の承認経路では承認できない。
pub fn approve(
    conn: &Connection,
    in_flight: &InFlightRegistry,
    actor: &Actor,
    id: i64,
) -> AppResult<Expense> {
    let _guard = in_flight
        .begin("approve", id)
        .ok_or_else(|| AppError::validation("承認処理が実行中です"))?;

    let expense = repository::find_by_id(conn, id)?;

    match expense.status {
        // 重複呼び出しは安全に許容する（UIは終了状態でボタンを無効化するが、
        // コアの契約としても二重承認をエラーにしない）
        ExpenseStatus::Approved => return Ok(expense),
        ExpenseStatus::Rejected => {
            return Err(AppError::invalid_transition(
                "却下済みの経費は承認できません",
            ));
        }
        ExpenseStatus::Pending => {}
    }

    can_act(actor, expense.owner_id, expense.team_id, ExpenseAction::Approve)?;

    // 不正フラグ付きの経費は強制却下かフラグ解除のみ許可される
    if expense.is_flagged() {
        return Err(AppError::invalid_transition(
            "不正フラグ付きの経費は承認できません（フラグの解除が必要です）",
        ));
    }

    if !repository::mark_approved(conn, id)? {
        return Err(AppError::invalid_transition(
            "経費は既に処理されています",
        ));
    }

    audit::repository::record(
        conn,
        actor.id,
        ExpenseAction::Approve.as_str(),
        "expense",
        id,
        None,
    )?;
    log::info!("経費を承認しました: id={id}, actor={}", actor.id);

    repository::find_by_id(conn, id)
}

/// 経費を却下する
///
/// # 引数
/// * `conn` - データベース接続
/// * `in_flight` - 実行中操作のレジストリ
/// * `actor` - 操作主体（マネージャーまたは管理者）
/// * `id` - 経費ID
/// * `reason` - 却下理由（必須）
///
/// # 戻り値
/// 却下後の経費、または失敗時はエラー
///
/// 空・空白のみの理由はバリデーションエラーとなり、状態は変更されない。
/// 却下済みの経費への再却下は現在の状態を返す（冪等）。
/// 不正フラグ付きの経費は通常の却下経路を通らず、強制却下のみ許可される。
pub fn reject(
    conn: &Connection,
    in_flight: &InFlightRegistry,
    actor: &Actor,
    id: i64,
    reason: &str,
) -> AppResult<Expense> {
    let _guard = in_flight
        .begin("reject", id)
        .ok_or_else(|| AppError::validation("却下処理が実行中です"))?;

    // 理由のバリデーションは状態遷移より先に行う
    validate_required_field(reason, "却下理由")?;

    let expense = repository::find_by_id(conn, id)?;

    match expense.status {
        ExpenseStatus::Rejected => return Ok(expense),
        ExpenseStatus::Approved => {
            return Err(AppError::invalid_transition(
                "承認済みの経費は却下できません",
            ));
        }
        ExpenseStatus::Pending => {}
    }

    can_act(actor, expense.owner_id, expense.team_id, ExpenseAction::Reject)?;

    // 不正フラグ付きの経費の許可される遷移は強制却下のみ
    if expense.is_flagged() {
        return Err(AppError::invalid_transition(
            "不正フラグ付きの経費は通常の却下ができません（強制却下を使用してください）",
        ));
    }

    if !repository::mark_rejected(conn, id, reason.trim())? {
        return Err(AppError::invalid_transition(
            "経費は既に処理されています",
        ));
    }

    audit::repository::record(
        conn,
        actor.id,
        ExpenseAction::Reject.as_str(),
        "expense",
        id,
        Some(reason.trim()),
    )?;
    log::info!("経費を却下しました: id={id}, actor={}", actor.id);

    repository::find_by_id(conn, id)
}

/// 経費を編集する（承認待ちの間のみ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体（所有者本人）
/// * `id` - 経費ID
/// * `dto` - 経費更新用DTO
///
/// # 戻り値
/// 更新後の経費、または失敗時はエラー
///
/// 終了状態（承認済み・却下）の経費は編集できない。修正が必要な場合は
/// 新しい申請として作成する。金額・日付を変更する編集は凍結チェックを、
/// 金額・日付・カテゴリ・領収書を変更する編集はポリシーバリデーションを
/// 再実行する。タイトル・説明のみの編集はどちらも受けない。
pub fn edit(conn: &Connection, actor: &Actor, id: i64, dto: UpdateExpenseDto) -> AppResult<Expense> {
    let existing = repository::find_by_id(conn, id)?;

    if existing.status.is_terminal() {
        return Err(AppError::invalid_transition(
            "承認・却下済みの経費は編集できません",
        ));
    }

    can_act(actor, existing.owner_id, existing.team_id, ExpenseAction::Edit)?;

    let amount_changed = dto.amount.is_some_and(|a| a != existing.amount);
    let date_changed = dto.date.as_deref().is_some_and(|d| d != existing.date);
    let category_changed = dto.category.as_deref().is_some_and(|c| c != existing.category);
    let receipt_changed = dto.receipt_url.is_some() && dto.receipt_url != existing.receipt_url;

    // 更新するフィールドを決定
    let title = dto.title.unwrap_or(existing.title);
    let amount = dto.amount.unwrap_or(existing.amount);
    let category = dto.category.unwrap_or(existing.category);
    let date = dto.date.unwrap_or(existing.date);
    let description = dto.description.or(existing.description);
    let receipt_url = dto.receipt_url.or(existing.receipt_url);

    validate_draft_fields(&title, amount, &category, &date, &description)?;

    if category_changed {
        categories::service::ensure_usable(conn, &category, actor.role)?;
    }

    // 金額・日付を変更する編集は移動先の期間の凍結チェックを受ける
    if amount_changed || date_changed {
        budgets::ensure_not_frozen(conn, existing.team_id, &date)?;
    }

    // ポリシーの再検証は判定対象の項目を動かす編集のみが受ける
    // （タイトル・説明のみの編集は申請時の判定結果を引き継ぐ）
    if amount_changed || date_changed || category_changed || receipt_changed {
        let period = budgets::check_period(conn, existing.team_id, &date, amount)?;
        let active_policies = policies::repository::find_active(conn)?;
        policies::validate(
            &active_policies,
            existing.team_id,
            &category,
            amount,
            receipt_url.is_some(),
            period.spent_amount,
        )?;
    }

    repository::update_fields(
        conn,
        id,
        &title,
        amount,
        &category,
        &date,
        description.as_deref(),
        receipt_url.as_deref(),
    )
}

/// 経費を削除する
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体（所有者または管理者）
/// * `id` - 経費ID
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
///
/// 承認済みの経費は削除できない（会計記録として保全される）。
pub fn remove(conn: &Connection, actor: &Actor, id: i64) -> AppResult<()> {
    let expense = repository::find_by_id(conn, id)?;

    if expense.status == ExpenseStatus::Approved {
        return Err(AppError::invalid_transition(
            "承認済みの経費は削除できません",
        ));
    }

    can_act(actor, expense.owner_id, expense.team_id, ExpenseAction::Delete)?;

    repository::delete(conn, id)?;
    log::info!("経費を削除しました: id={id}, actor={}", actor.id);

    Ok(())
}

/// 経費一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `filter` - 検索フィルター
///
/// # 戻り値
/// 経費のリスト、または失敗時はエラー
pub fn find_all(conn: &Connection, filter: &ExpenseFilter) -> AppResult<Vec<Expense>> {
    repository::find_all(conn, filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::categories::CreateCategoryDto;
    use crate::features::policies::CreatePolicyDto;
    use crate::features::roles::Role;
    use crate::shared::db::initialize_schema;
    use crate::shared::errors::PolicyViolation;

    struct TestContext {
        conn: Connection,
        in_flight: InFlightRegistry,
    }

    fn setup() -> TestContext {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        // 基本カテゴリを用意
        let admin = admin();
        for name in ["交通費", "宿泊費"] {
            categories::service::create(
                &conn,
                &admin,
                CreateCategoryDto {
                    name: name.to_string(),
                    color: None,
                    allowed_role: None,
                },
            )
            .unwrap();
        }

        TestContext {
            conn,
            in_flight: InFlightRegistry::new(),
        }
    }

    fn admin() -> Actor {
        Actor::new(100, Role::Admin, None)
    }

    fn user(id: i64, team: i64) -> Actor {
        Actor::new(id, Role::User, Some(team))
    }

    fn manager(id: i64, team: i64) -> Actor {
        Actor::new(id, Role::Manager, Some(team))
    }

    fn draft(amount: f64, date: &str) -> CreateExpenseDto {
        CreateExpenseDto {
            title: "出張旅費".to_string(),
            amount,
            category: "交通費".to_string(),
            date: date.to_string(),
            description: None,
            receipt_url: None,
        }
    }

    fn submit_ok(ctx: &TestContext, actor: &Actor, dto: CreateExpenseDto) -> Expense {
        submit(&ctx.conn, &ctx.in_flight, actor, dto).unwrap().expense
    }

    #[test]
    fn test_submit_creates_pending_expense() {
        let ctx = setup();
        let actor = user(1, 1);

        let outcome = submit(&ctx.conn, &ctx.in_flight, &actor, draft(1000.0, "2024-03-01")).unwrap();
        assert_eq!(outcome.expense.status, ExpenseStatus::Pending);
        assert_eq!(outcome.expense.owner_id, 1);
        assert_eq!(outcome.expense.team_id, 1);
        assert!(outcome.budget_warning.is_none());
    }

    #[test]
    fn test_submit_into_frozen_period_creates_nothing() {
        let ctx = setup();
        budgets::freeze_period(&ctx.conn, &admin(), 1, 3, 2024).unwrap();

        let result = submit(&ctx.conn, &ctx.in_flight, &user(1, 1), draft(1000.0, "2024-03-15"));
        assert!(matches!(result, Err(AppError::PeriodFrozen(_))));

        // レコードは一切作成されない
        let all = find_all(&ctx.conn, &ExpenseFilter::default()).unwrap();
        assert!(all.is_empty());

        // 他の月への申請は可能
        assert!(submit(&ctx.conn, &ctx.in_flight, &user(1, 1), draft(1000.0, "2024-04-01")).is_ok());
    }

    #[test]
    fn test_submit_rejects_policy_violation_with_details() {
        let ctx = setup();
        policies::service::create(
            &ctx.conn,
            &admin(),
            CreatePolicyDto {
                name: "上限ポリシー".to_string(),
                description: None,
                team_id: None,
                max_amount: Some(1000.0),
                monthly_limit: None,
                requires_receipt: false,
                allowed_categories: vec![],
            },
        )
        .unwrap();

        let result = submit(&ctx.conn, &ctx.in_flight, &user(1, 1), draft(1500.0, "2024-03-01"));
        match result {
            Err(AppError::PolicyViolation(violations)) => {
                assert!(violations.contains(&PolicyViolation::MaxAmountExceeded {
                    limit: 1000.0,
                    amount: 1500.0
                }));
            }
            other => panic!("ポリシー違反を期待したが: {other:?}"),
        }

        // 境界値（上限ちょうど）は適合
        assert!(submit(&ctx.conn, &ctx.in_flight, &user(1, 1), draft(1000.0, "2024-03-01")).is_ok());
    }

    #[test]
    fn test_submit_budget_exceeded_is_advisory_without_policy() {
        let ctx = setup();

        // チーム1の2024年3月: 予算2000、既存の承認済み支出1800
        budgets::set_budget(&ctx.conn, &admin(), 1, 3, 2024, 2000.0).unwrap();
        let existing = submit_ok(&ctx, &user(1, 1), draft(1800.0, "2024-03-05"));
        approve(&ctx.conn, &ctx.in_flight, &manager(50, 1), existing.id).unwrap();

        // 150の申請は超過せず警告なし
        let outcome =
            submit(&ctx.conn, &ctx.in_flight, &user(1, 1), draft(150.0, "2024-03-10")).unwrap();
        assert!(outcome.budget_warning.is_none());

        // 300の申請は超過するが、ポリシーの月次上限がないため申請は成立し
        // 警告のみが添付される
        let outcome =
            submit(&ctx.conn, &ctx.in_flight, &user(1, 1), draft(300.0, "2024-03-10")).unwrap();
        let warning = outcome.budget_warning.unwrap();
        assert_eq!(warning.current_spend, 1800.0);
        assert_eq!(warning.limit, 2000.0);
        assert_eq!(outcome.expense.status, ExpenseStatus::Pending);
    }

    #[test]
    fn test_submit_budget_exceeded_blocks_when_policy_limit_is_breached() {
        let ctx = setup();

        // ポリシーの月次上限が予算と連動している場合はハードブロックになる
        budgets::set_budget(&ctx.conn, &admin(), 1, 3, 2024, 2000.0).unwrap();
        policies::service::create(
            &ctx.conn,
            &admin(),
            CreatePolicyDto {
                name: "月次上限ポリシー".to_string(),
                description: None,
                team_id: Some(1),
                max_amount: None,
                monthly_limit: Some(2000.0),
                requires_receipt: false,
                allowed_categories: vec![],
            },
        )
        .unwrap();

        let existing = submit_ok(&ctx, &user(1, 1), draft(1800.0, "2024-03-05"));
        approve(&ctx.conn, &ctx.in_flight, &manager(50, 1), existing.id).unwrap();

        let result = submit(&ctx.conn, &ctx.in_flight, &user(1, 1), draft(300.0, "2024-03-10"));
        match result {
            Err(AppError::PolicyViolation(violations)) => {
                assert!(violations.contains(&PolicyViolation::MonthlyLimitExceeded {
                    limit: 2000.0,
                    projected: 2100.0
                }));
            }
            other => panic!("ポリシー違反を期待したが: {other:?}"),
        }
    }

    #[test]
    fn test_submit_accepts_opaque_receipt_reference() {
        let ctx = setup();

        // 領収書参照は不透明な文字列であり、形式の検証は保管層に委ねる
        let mut dto = draft(1000.0, "2024-03-01");
        dto.receipt_url = Some("r2://bucket/receipt-123".to_string());

        let outcome = submit(&ctx.conn, &ctx.in_flight, &user(1, 1), dto).unwrap();
        assert_eq!(
            outcome.expense.receipt_url,
            Some("r2://bucket/receipt-123".to_string())
        );
    }

    #[test]
    fn test_submit_requires_usable_category() {
        let ctx = setup();

        let mut dto = draft(1000.0, "2024-03-01");
        dto.category = "存在しないカテゴリ".to_string();
        let result = submit(&ctx.conn, &ctx.in_flight, &user(1, 1), dto);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_approve_lifecycle() {
        let ctx = setup();
        let expense = submit_ok(&ctx, &user(1, 1), draft(1000.0, "2024-03-01"));

        let approved = approve(&ctx.conn, &ctx.in_flight, &manager(50, 1), expense.id).unwrap();
        assert_eq!(approved.status, ExpenseStatus::Approved);

        // 再承認は冪等（エラーにならず現在の状態を返す）
        let again = approve(&ctx.conn, &ctx.in_flight, &manager(50, 1), expense.id).unwrap();
        assert_eq!(again.status, ExpenseStatus::Approved);

        // 承認済みの却下はInvalidTransition
        let result = reject(&ctx.conn, &ctx.in_flight, &manager(50, 1), expense.id, "理由");
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
    }

    #[test]
    fn test_terminal_transition_does_not_mutate_fields() {
        let ctx = setup();
        let expense = submit_ok(&ctx, &user(1, 1), draft(1000.0, "2024-03-01"));

        let approved = approve(&ctx.conn, &ctx.in_flight, &manager(50, 1), expense.id).unwrap();

        // 状態遷移は金額・カテゴリ・日付を変更しない
        assert_eq!(approved.amount, expense.amount);
        assert_eq!(approved.category, expense.category);
        assert_eq!(approved.date, expense.date);

        // 重複承認後も同様
        let again = approve(&ctx.conn, &ctx.in_flight, &manager(50, 1), expense.id).unwrap();
        assert_eq!(again.amount, expense.amount);
        assert_eq!(again.category, expense.category);
        assert_eq!(again.date, expense.date);
    }

    #[test]
    fn test_self_approval_is_denied() {
        let ctx = setup();
        let actor = manager(10, 1);
        let expense = submit_ok(&ctx, &actor, draft(1000.0, "2024-03-01"));

        // 所有者は自分の経費を承認・却下できない
        let result = approve(&ctx.conn, &ctx.in_flight, &actor, expense.id);
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));

        let result = reject(&ctx.conn, &ctx.in_flight, &actor, expense.id, "理由");
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));

        // 状態は変わっていない
        let current = repository::find_by_id(&ctx.conn, expense.id).unwrap();
        assert_eq!(current.status, ExpenseStatus::Pending);
    }

    #[test]
    fn test_reject_requires_non_empty_reason() {
        let ctx = setup();
        let expense = submit_ok(&ctx, &user(1, 1), draft(1000.0, "2024-03-01"));
        let reviewer = manager(50, 1);

        // 空・空白のみの理由はバリデーションエラー
        for reason in ["", "   ", "\t\n"] {
            let result = reject(&ctx.conn, &ctx.in_flight, &reviewer, expense.id, reason);
            assert!(matches!(result, Err(AppError::Validation(_))));

            // 状態は変更されない
            let current = repository::find_by_id(&ctx.conn, expense.id).unwrap();
            assert_eq!(current.status, ExpenseStatus::Pending);
        }

        let rejected =
            reject(&ctx.conn, &ctx.in_flight, &reviewer, expense.id, "領収書不備").unwrap();
        assert_eq!(rejected.status, ExpenseStatus::Rejected);
        assert_eq!(rejected.rejection_reason, Some("領収書不備".to_string()));
    }

    #[test]
    fn test_manager_cannot_review_other_team() {
        let ctx = setup();
        let expense = submit_ok(&ctx, &user(1, 1), draft(1000.0, "2024-03-01"));

        let result = approve(&ctx.conn, &ctx.in_flight, &manager(50, 2), expense.id);
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));

        // 管理者は全チームを承認できる
        assert!(approve(&ctx.conn, &ctx.in_flight, &admin(), expense.id).is_ok());
    }

    #[test]
    fn test_approve_in_frozen_period_still_works() {
        let ctx = setup();
        let expense = submit_ok(&ctx, &user(1, 1), draft(1000.0, "2024-03-01"));

        // 凍結は新規の支出をブロックするが、既存の承認待ちの審査は妨げない
        budgets::freeze_period(&ctx.conn, &admin(), 1, 3, 2024).unwrap();

        let approved = approve(&ctx.conn, &ctx.in_flight, &manager(50, 1), expense.id).unwrap();
        assert_eq!(approved.status, ExpenseStatus::Approved);
    }

    #[test]
    fn test_edit_while_pending_only() {
        let ctx = setup();
        let owner = user(1, 1);
        let expense = submit_ok(&ctx, &owner, draft(1000.0, "2024-03-01"));

        let updated = edit(
            &ctx.conn,
            &owner,
            expense.id,
            UpdateExpenseDto {
                title: None,
                amount: Some(2000.0),
                category: None,
                date: None,
                description: Some("金額修正".to_string()),
                receipt_url: None,
            },
        )
        .unwrap();
        assert_eq!(updated.amount, 2000.0);

        // 終了状態の経費は編集できない
        approve(&ctx.conn, &ctx.in_flight, &manager(50, 1), expense.id).unwrap();
        let result = edit(
            &ctx.conn,
            &owner,
            expense.id,
            UpdateExpenseDto {
                title: None,
                amount: Some(9999.0),
                category: None,
                date: None,
                description: None,
                receipt_url: None,
            },
        );
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
    }

    #[test]
    fn test_edit_into_frozen_period_is_rejected() {
        let ctx = setup();
        let owner = user(1, 1);
        let expense = submit_ok(&ctx, &owner, draft(1000.0, "2024-03-01"));

        budgets::freeze_period(&ctx.conn, &admin(), 1, 4, 2024).unwrap();

        // 凍結された月へ日付を移す編集は拒否される
        let result = edit(
            &ctx.conn,
            &owner,
            expense.id,
            UpdateExpenseDto {
                title: None,
                amount: None,
                category: None,
                date: Some("2024-04-10".to_string()),
                description: None,
                receipt_url: None,
            },
        );
        assert!(matches!(result, Err(AppError::PeriodFrozen(_))));

        // 金額・日付を変えない編集（説明のみ）は凍結の影響を受けない
        budgets::freeze_period(&ctx.conn, &admin(), 1, 3, 2024).unwrap();
        let result = edit(
            &ctx.conn,
            &owner,
            expense.id,
            UpdateExpenseDto {
                title: None,
                amount: None,
                category: None,
                date: None,
                description: Some("補足".to_string()),
                receipt_url: None,
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_edit_of_title_or_description_skips_policy_revalidation() {
        let ctx = setup();
        let owner = user(1, 1);
        let expense = submit_ok(&ctx, &owner, draft(1500.0, "2024-03-01"));

        // 申請後に作られた、既存の申請額より厳しいポリシー
        policies::service::create(
            &ctx.conn,
            &admin(),
            CreatePolicyDto {
                name: "後付けの上限ポリシー".to_string(),
                description: None,
                team_id: None,
                max_amount: Some(1000.0),
                monthly_limit: None,
                requires_receipt: false,
                allowed_categories: vec![],
            },
        )
        .unwrap();

        // 説明のみの編集は申請時の判定結果を引き継ぎ、成功する
        let updated = edit(
            &ctx.conn,
            &owner,
            expense.id,
            UpdateExpenseDto {
                title: Some("出張旅費（修正）".to_string()),
                amount: None,
                category: None,
                date: None,
                description: Some("補足".to_string()),
                receipt_url: None,
            },
        )
        .unwrap();
        assert_eq!(updated.amount, 1500.0);

        // 金額を動かす編集は新しいポリシーの判定を受ける
        let result = edit(
            &ctx.conn,
            &owner,
            expense.id,
            UpdateExpenseDto {
                title: None,
                amount: Some(1200.0),
                category: None,
                date: None,
                description: None,
                receipt_url: None,
            },
        );
        assert!(matches!(result, Err(AppError::PolicyViolation(_))));
    }

    #[test]
    fn test_edit_by_non_owner_is_denied() {
        let ctx = setup();
        let expense = submit_ok(&ctx, &user(1, 1), draft(1000.0, "2024-03-01"));

        let result = edit(
            &ctx.conn,
            &user(2, 1),
            expense.id,
            UpdateExpenseDto {
                title: Some("改ざん".to_string()),
                amount: None,
                category: None,
                date: None,
                description: None,
                receipt_url: None,
            },
        );
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }

    #[test]
    fn test_remove_approved_expense_is_denied() {
        let ctx = setup();
        let owner = user(1, 1);
        let expense = submit_ok(&ctx, &owner, draft(1000.0, "2024-03-01"));

        approve(&ctx.conn, &ctx.in_flight, &manager(50, 1), expense.id).unwrap();

        // 承認済みの経費は削除できない
        let result = remove(&ctx.conn, &owner, expense.id);
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));

        // 却下済みの経費は削除できる
        let rejected = submit_ok(&ctx, &owner, draft(500.0, "2024-03-02"));
        reject(&ctx.conn, &ctx.in_flight, &manager(50, 1), rejected.id, "重複").unwrap();
        assert!(remove(&ctx.conn, &owner, rejected.id).is_ok());
    }

    #[test]
    fn test_approve_writes_audit_log() {
        let ctx = setup();
        let expense = submit_ok(&ctx, &user(1, 1), draft(1000.0, "2024-03-01"));

        approve(&ctx.conn, &ctx.in_flight, &manager(50, 1), expense.id).unwrap();

        let entries = audit::repository::find_recent(&ctx.conn, 10).unwrap();
        assert!(entries
            .iter()
            .any(|e| e.action == "approve" && e.entity_id == expense.id));
    }
}
