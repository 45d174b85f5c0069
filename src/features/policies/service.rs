use crate::features::audit;
use crate::features::policies::models::{CreatePolicyDto, Policy, UpdatePolicyDto};
use crate::features::policies::repository;
use crate::features::roles::{can_administer, Actor};
use crate::shared::errors::{AppError, AppResult, PolicyViolation};
use crate::shared::utils::validate_required_field;
use rusqlite::Connection;

/// 適用ポリシー集約後の実効制約
///
/// 同一チームに複数のポリシーが適用される場合、最も厳しい制約が勝つ：
/// 上限金額・月次上限は最小値、領収書要否は論理和。
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveBounds {
    pub max_amount: Option<f64>,
    pub monthly_limit: Option<f64>,
    pub requires_receipt: bool,
}

/// 申請に適用される実効制約を集約する
///
/// # 引数
/// * `policies` - 全ポリシー（非アクティブは内部で除外される）
/// * `team_id` - 申請のチームID
/// * `category` - 申請のカテゴリ
///
/// # 戻り値
/// 集約された実効制約
///
/// カテゴリ制限を持つポリシーは、制限リストに申請カテゴリが含まれる場合のみ
/// 上限の算出に参加する。
pub fn effective_bounds(policies: &[Policy], team_id: i64, category: &str) -> EffectiveBounds {
    let bounding: Vec<&Policy> = policies
        .iter()
        .filter(|p| p.applies_to_team(team_id) && p.bounds_category(category))
        .collect();

    // 最小値が勝つ（存在しない値は無視）
    let max_amount = bounding
        .iter()
        .filter_map(|p| p.max_amount)
        .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.min(v))));
    let monthly_limit = bounding
        .iter()
        .filter_map(|p| p.monthly_limit)
        .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.min(v))));

    // 領収書要否は論理和（どれか1つでも要求すれば必須）
    let requires_receipt = bounding.iter().any(|p| p.requires_receipt);

    EffectiveBounds {
        max_amount,
        monthly_limit,
        requires_receipt,
    }
}

/// 申請内容をポリシーに対してバリデーションする
///
/// # 引数
/// * `policies` - 全ポリシー（非アクティブは内部で除外される）
/// * `team_id` - 申請のチームID
/// * `category` - 申請のカテゴリ
/// * `amount` - 申請金額
/// * `has_receipt` - 領収書が添付されているか
/// * `month_spend` - 当該月の承認済み支出合計（月次上限の判定用）
///
/// # 戻り値
/// 違反がない場合はOk(())、違反がある場合は全件を保持したPolicyViolationエラー
///
/// # 判定規則
/// 1. 上限金額: 実効上限を超える場合に違反（上限ちょうどは適合）
/// 2. 月次上限: 承認済み支出 + 申請額が実効上限を超える場合に違反
/// 3. 領収書: 実効要否が必須で未添付の場合に違反
/// 4. カテゴリ: カテゴリ制限を持つ適用ポリシーが存在し、どの制限リストにも
///    申請カテゴリが含まれない場合に違反
///
/// 違反は最初の1件で打ち切らず、すべて収集して返す。
pub fn validate(
    policies: &[Policy],
    team_id: i64,
    category: &str,
    amount: f64,
    has_receipt: bool,
    month_spend: f64,
) -> AppResult<()> {
    let mut violations = Vec::new();

    let bounds = effective_bounds(policies, team_id, category);

    // 1. 上限金額（境界値は適合：amount == limit は違反ではない）
    if let Some(limit) = bounds.max_amount {
        if amount > limit {
            violations.push(PolicyViolation::MaxAmountExceeded { limit, amount });
        }
    }

    // 2. 月次上限
    if let Some(limit) = bounds.monthly_limit {
        let projected = month_spend + amount;
        if projected > limit {
            violations.push(PolicyViolation::MonthlyLimitExceeded { limit, projected });
        }
    }

    // 3. 領収書要否
    if bounds.requires_receipt && !has_receipt {
        violations.push(PolicyViolation::ReceiptRequired);
    }

    // 4. カテゴリ制限
    // チームに適用されるポリシーのうちカテゴリ制限を持つものを集め、
    // どの制限リストにも含まれないカテゴリを拒否する
    let restricting: Vec<&Policy> = policies
        .iter()
        .filter(|p| p.applies_to_team(team_id) && p.restricts_categories())
        .collect();
    if !restricting.is_empty()
        && !restricting
            .iter()
            .any(|p| p.allowed_categories.iter().any(|c| c == category))
    {
        violations.push(PolicyViolation::CategoryNotAllowed {
            category: category.to_string(),
        });
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(AppError::PolicyViolation(violations))
    }
}

/// ポリシーを作成する（管理者のみ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体
/// * `dto` - ポリシー作成用DTO
///
/// # 戻り値
/// 作成されたポリシー、または失敗時はエラー
pub fn create(conn: &Connection, actor: &Actor, dto: CreatePolicyDto) -> AppResult<Policy> {
    can_administer(actor)?;
    validate_required_field(&dto.name, "ポリシー名")?;

    let policy = repository::create(conn, dto)?;
    audit::repository::record(
        conn,
        actor.id,
        "policy_create",
        "policy",
        policy.id,
        Some(&policy.name),
    )?;
    log::info!("ポリシーを作成しました: id={}, name={}", policy.id, policy.name);

    Ok(policy)
}

/// ポリシーを更新する（管理者のみ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体
/// * `id` - ポリシーID
/// * `dto` - ポリシー更新用DTO
///
/// # 戻り値
/// 更新されたポリシー、または失敗時はエラー
pub fn update(
    conn: &Connection,
    actor: &Actor,
    id: i64,
    dto: UpdatePolicyDto,
) -> AppResult<Policy> {
    can_administer(actor)?;

    let policy = repository::update(conn, id, dto)?;
    audit::repository::record(
        conn,
        actor.id,
        "policy_update",
        "policy",
        policy.id,
        Some(&policy.name),
    )?;

    Ok(policy)
}

/// ポリシーを削除する（管理者のみ）
///
/// # 引数
/// * `conn` - データベース接続
/// * `actor` - 操作主体
/// * `id` - ポリシーID
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn delete(conn: &Connection, actor: &Actor, id: i64) -> AppResult<()> {
    can_administer(actor)?;

    repository::delete(conn, id)?;
    audit::repository::record(conn, actor.id, "policy_delete", "policy", id, None)?;

    Ok(())
}
