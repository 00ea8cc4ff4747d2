//! 심볼 검증 및 정규화.
//!
//! 입력 심볼은 공백 제거 후 대문자로 정규화됩니다. 허용 형식은
//! 첫 글자 `[A-Z0-9^]`, 이후 `[A-Z0-9.^=-]`, 최대 20자입니다
//! (예: "AAPL", "0700.HK", "BRK-B", "^GSPC").

use crate::error::{PricehubError, PricehubResult};

/// 요청당 허용되는 기본 최대 심볼 수.
pub const DEFAULT_MAX_QUERY_SYMBOLS: usize = 20;

/// 심볼 최대 길이.
const MAX_SYMBOL_LEN: usize = 20;

fn is_valid_leading_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '^'
}

fn is_valid_symbol_char(c: char) -> bool {
    is_valid_leading_char(c) || matches!(c, '.' | '=' | '-')
}

fn matches_symbol_pattern(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) if is_valid_leading_char(first) => {}
        _ => return false,
    }
    symbol.chars().count() <= MAX_SYMBOL_LEN && chars.all(is_valid_symbol_char)
}

/// 단일 심볼을 검증하고 정규화된 형태로 반환합니다.
pub fn validate_symbol(raw: &str) -> PricehubResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PricehubError::Input("symbol is required".to_string()));
    }
    if trimmed.chars().count() > MAX_SYMBOL_LEN {
        return Err(PricehubError::Input(
            "symbol length cannot exceed 20".to_string(),
        ));
    }

    let symbol = trimmed.to_uppercase();
    if !matches_symbol_pattern(&symbol) {
        return Err(PricehubError::Input(format!(
            "invalid symbol format: {symbol}"
        )));
    }

    Ok(symbol)
}

/// 공백/쉼표로 구분된 심볼 목록을 파싱합니다.
///
/// 대문자로 정규화하고 입력 순서를 유지하며 중복을 제거합니다.
pub fn parse_symbols_input(raw: &str, max_symbols: usize) -> PricehubResult<Vec<String>> {
    let mut symbols: Vec<String> = Vec::new();
    for part in raw.split([' ', '\t', '\n', '\r', ',']) {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let upper = trimmed.to_uppercase();
        if !symbols.contains(&upper) {
            symbols.push(upper);
        }
    }

    if symbols.is_empty() {
        return Err(PricehubError::Input(
            "please provide at least one symbol".to_string(),
        ));
    }

    if symbols.len() > max_symbols {
        return Err(PricehubError::Input(format!(
            "at most {max_symbols} symbols are allowed per request"
        )));
    }

    let invalid: Vec<&String> = symbols
        .iter()
        .filter(|symbol| !matches_symbol_pattern(symbol))
        .collect();
    if !invalid.is_empty() {
        let joined = invalid
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(PricehubError::Input(format!(
            "invalid symbol format: {joined}"
        )));
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_symbol_normalizes() {
        assert_eq!(validate_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(validate_symbol("0700.hk").unwrap(), "0700.HK");
        assert_eq!(validate_symbol("brk-b").unwrap(), "BRK-B");
        assert_eq!(validate_symbol("^gspc").unwrap(), "^GSPC");
    }

    #[test]
    fn test_validate_symbol_rejects_invalid() {
        assert!(validate_symbol("").is_err());
        assert!(validate_symbol("   ").is_err());
        assert!(validate_symbol(".AAPL").is_err());
        assert!(validate_symbol("-AAPL").is_err());
        assert!(validate_symbol("AAPL MSFT").is_err());
        assert!(validate_symbol("A".repeat(21).as_str()).is_err());
    }

    #[test]
    fn test_parse_symbols_input_dedupes_and_uppercases() {
        let symbols = parse_symbols_input("aapl msft,aapl", DEFAULT_MAX_QUERY_SYMBOLS).unwrap();
        assert_eq!(symbols, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn test_parse_symbols_input_rejects_empty() {
        assert!(parse_symbols_input("  , ", DEFAULT_MAX_QUERY_SYMBOLS).is_err());
    }

    #[test]
    fn test_parse_symbols_input_enforces_limit() {
        let err = parse_symbols_input("A B C", 2).unwrap_err();
        assert!(err.to_string().contains("at most 2"));
    }

    #[test]
    fn test_parse_symbols_input_reports_invalid_symbols() {
        let err = parse_symbols_input("AAPL .BAD", DEFAULT_MAX_QUERY_SYMBOLS).unwrap_err();
        assert!(err.to_string().contains(".BAD"));
    }
}
