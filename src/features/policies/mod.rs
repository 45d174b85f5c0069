/// ポリシー機能モジュール
///
/// 支出ポリシーのモデル・リポジトリと、複数ポリシーの決定的な集約
/// アルゴリズム（最も厳しい制約が勝つ）によるバリデーションを提供します。
pub mod models;
pub mod repository;
pub mod service;

pub use models::{CreatePolicyDto, Policy, UpdatePolicyDto};
pub use service::{effective_bounds, validate, EffectiveBounds};
