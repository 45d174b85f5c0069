/// カテゴリ機能モジュール
///
/// カテゴリのモデル、リポジトリ、管理操作（管理者専用）と
/// ロール別の表示フィルタリングを提供します。
pub mod models;
pub mod repository;
pub mod service;

pub use models::{Category, CreateCategoryDto, UpdateCategoryDto};
