use crate::shared::errors::{AppError, AppResult};
use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Asia::Tokyo;

/// 日付文字列のバリデーション
///
/// # 引数
/// * `date_str` - 日付文字列（YYYY-MM-DD形式）
///
/// # 戻り値
/// 有効な日付の場合はOk(())、無効な場合はエラー
///
/// # バリデーション規則
/// - YYYY-MM-DD形式であること
/// - 実在する日付であること
/// - 1900年以降、2100年以前であること
pub fn validate_date(date_str: &str) -> AppResult<()> {
    // 基本的な形式チェック
    if date_str.len() != 10 {
        return Err(AppError::validation(
            "日付はYYYY-MM-DD形式で入力してください",
        ));
    }

    // ハイフンの位置チェック
    if (date_str.chars().nth(4) != Some('-')) || (date_str.chars().nth(7) != Some('-')) {
        return Err(AppError::validation(
            "日付はYYYY-MM-DD形式で入力してください",
        ));
    }

    // 日付として解析可能かチェック
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| AppError::validation("無効な日付です"))?;

    // 年の範囲チェック
    let year = date.year();
    if !(1900..=2100).contains(&year) {
        return Err(AppError::validation(
            "日付は1900年から2100年の間で入力してください",
        ));
    }

    Ok(())
}

/// 日付文字列から（月, 年）の組を取得する
///
/// # 引数
/// * `date_str` - 日付文字列（YYYY-MM-DD形式）
///
/// # 戻り値
/// (月 1-12, 年)、または解析失敗時はエラー
pub fn month_year_of(date_str: &str) -> AppResult<(i64, i64)> {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| AppError::validation("日付の形式が正しくありません"))?;
    Ok((i64::from(date.month()), i64::from(date.year())))
}

/// 金額のバリデーション
///
/// # 引数
/// * `amount` - 金額
///
/// # 戻り値
/// 有効な金額の場合はOk(())、無効な場合はエラー
///
/// # バリデーション規則
/// - 0以上の数値であること
/// - 10桁以内であること（9,999,999,999円まで）
/// - 小数点以下は2桁まで
pub fn validate_amount(amount: f64) -> AppResult<()> {
    // 無限大・NaNチェック
    if !amount.is_finite() {
        return Err(AppError::validation("無効な金額です"));
    }

    // 負数チェック
    if amount < 0.0 {
        return Err(AppError::validation("金額は0以上で入力してください"));
    }

    // 上限チェック（10桁以内）
    if amount >= 10_000_000_000.0 {
        return Err(AppError::validation("金額は10桁以内で入力してください"));
    }

    // 小数点以下の桁数チェック（2桁まで）
    let amount_str = format!("{amount:.10}"); // 十分な精度で文字列化
    if let Some(decimal_pos) = amount_str.find('.') {
        let decimal_part = &amount_str[decimal_pos + 1..];
        let significant_decimals = decimal_part.trim_end_matches('0');
        if significant_decimals.len() > 2 {
            return Err(AppError::validation(
                "金額は小数点以下2桁まで入力してください",
            ));
        }
    }

    Ok(())
}

/// 文字列の長さバリデーション
///
/// # 引数
/// * `text` - 検証対象の文字列
/// * `max_length` - 最大文字数
/// * `field_name` - フィールド名（エラーメッセージ用）
///
/// # 戻り値
/// 有効な長さの場合はOk(())、無効な場合はエラー
pub fn validate_text_length(text: &str, max_length: usize, field_name: &str) -> AppResult<()> {
    let char_count = text.chars().count();
    if char_count > max_length {
        return Err(AppError::validation(format!(
            "{field_name}は{max_length}文字以内で入力してください（現在: {char_count}文字）"
        )));
    }
    Ok(())
}

/// 必須フィールドのバリデーション
///
/// # 引数
/// * `text` - 検証対象の文字列
/// * `field_name` - フィールド名（エラーメッセージ用）
///
/// # 戻り値
/// 空でない場合はOk(())、空の場合はエラー
pub fn validate_required_field(text: &str, field_name: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::validation(format!("{field_name}は必須項目です")));
    }
    Ok(())
}

/// カテゴリ名のバリデーション
///
/// # 引数
/// * `category` - カテゴリ名
///
/// # 戻り値
/// 有効なカテゴリ名の場合はOk(())、無効な場合はエラー
pub fn validate_category(category: &str) -> AppResult<()> {
    validate_required_field(category, "カテゴリ")?;
    validate_text_length(category, 50, "カテゴリ")?;
    Ok(())
}

/// 説明文のバリデーション
///
/// # 引数
/// * `description` - 説明文（Option）
///
/// # 戻り値
/// 有効な説明文の場合はOk(())、無効な場合はエラー
pub fn validate_description(description: &Option<String>) -> AppResult<()> {
    if let Some(desc) = description {
        validate_text_length(desc, 500, "説明")?;
    }
    Ok(())
}

/// 現在の日時をJST（日本標準時）で取得
///
/// # 戻り値
/// JST形式のRFC3339文字列
pub fn get_current_jst_timestamp() -> String {
    let now_jst = Utc::now().with_timezone(&Tokyo);
    now_jst.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_date_accepts_valid_dates() {
        assert!(validate_date("2024-03-15").is_ok());
        assert!(validate_date("2024-02-29").is_ok()); // 閏年
    }

    #[test]
    fn test_validate_date_rejects_invalid_dates() {
        assert!(validate_date("2024/03/15").is_err());
        assert!(validate_date("2024-13-01").is_err());
        assert!(validate_date("2023-02-29").is_err()); // 非閏年
        assert!(validate_date("15-03-2024").is_err());
        assert!(validate_date("").is_err());
        assert!(validate_date("1899-12-31").is_err()); // 範囲外
    }

    #[test]
    fn test_month_year_of() {
        assert_eq!(month_year_of("2024-03-15").unwrap(), (3, 2024));
        assert_eq!(month_year_of("2025-12-01").unwrap(), (12, 2025));
        assert!(month_year_of("not-a-date").is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(1000.0).is_ok());
        assert!(validate_amount(0.0).is_ok()); // 0は許可（下限は0以上）
        assert!(validate_amount(999.99).is_ok());
        assert!(validate_amount(-1.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
        assert!(validate_amount(10_000_000_000.0).is_err());
        assert!(validate_amount(1.999).is_err()); // 小数点以下3桁
    }

    #[test]
    fn test_validate_required_field() {
        assert!(validate_required_field("出張旅費", "タイトル").is_ok());
        assert!(validate_required_field("", "タイトル").is_err());
        assert!(validate_required_field("   ", "タイトル").is_err());
    }

    #[test]
    fn test_validate_category() {
        assert!(validate_category("交通費").is_ok());
        assert!(validate_category("").is_err());
        let too_long = "あ".repeat(51);
        assert!(validate_category(&too_long).is_err());
    }

    #[test]
    fn test_get_current_jst_timestamp_format() {
        // JSTタイムスタンプがRFC3339形式であることを確認
        let ts = get_current_jst_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.contains("+09:00"));
    }
}
