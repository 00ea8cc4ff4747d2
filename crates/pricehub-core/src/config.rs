//! 환경변수 기반 서비스 설정.

use crate::types::symbol::DEFAULT_MAX_QUERY_SYMBOLS;

/// 기본 관심 종목 (워치리스트가 비어 있을 때 시드).
pub const DEFAULT_WATCHLIST_SYMBOLS: &[&str] = &["AAPL", "MSFT", "GOOGL", "0700.HK", "9988.HK"];

/// 서비스 공통 환경 설정.
#[derive(Debug, Clone)]
pub struct AppEnv {
    /// 내부 일일 갱신 엔드포인트 보호 토큰 (비어 있으면 비활성)
    pub update_api_token: String,
    /// 요청당 최대 심볼 수
    pub max_query_symbols: usize,
    /// 기본 워치리스트 심볼
    pub default_watchlist: Vec<String>,
}

impl Default for AppEnv {
    fn default() -> Self {
        Self {
            update_api_token: String::new(),
            max_query_symbols: DEFAULT_MAX_QUERY_SYMBOLS,
            default_watchlist: DEFAULT_WATCHLIST_SYMBOLS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl AppEnv {
    /// 환경변수에서 설정을 로드합니다.
    ///
    /// # 환경변수
    /// - `UPDATE_API_TOKEN`: 내부 갱신 엔드포인트 토큰
    /// - `MAX_QUERY_SYMBOLS`: 요청당 최대 심볼 수 (기본: 20)
    /// - `DEFAULT_WATCHLIST`: 쉼표 구분 기본 워치리스트
    pub fn from_env() -> Self {
        Self {
            update_api_token: std::env::var("UPDATE_API_TOKEN")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            max_query_symbols: parse_max_query_symbols(std::env::var("MAX_QUERY_SYMBOLS").ok()),
            default_watchlist: parse_default_watchlist(std::env::var("DEFAULT_WATCHLIST").ok()),
        }
    }
}

fn parse_max_query_symbols(value: Option<String>) -> usize {
    value
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|parsed| *parsed > 0)
        .map(|parsed| parsed as usize)
        .unwrap_or(DEFAULT_MAX_QUERY_SYMBOLS)
}

fn parse_default_watchlist(value: Option<String>) -> Vec<String> {
    let raw = match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            return DEFAULT_WATCHLIST_SYMBOLS
                .iter()
                .map(|s| (*s).to_string())
                .collect()
        }
    };

    raw.split(',')
        .map(|symbol| symbol.trim().to_uppercase())
        .filter(|symbol| !symbol.is_empty())
        .collect()
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용).
pub fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱.
pub fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_max_query_symbols_defaults() {
        assert_eq!(parse_max_query_symbols(None), DEFAULT_MAX_QUERY_SYMBOLS);
        assert_eq!(
            parse_max_query_symbols(Some("abc".to_string())),
            DEFAULT_MAX_QUERY_SYMBOLS
        );
        assert_eq!(
            parse_max_query_symbols(Some("0".to_string())),
            DEFAULT_MAX_QUERY_SYMBOLS
        );
        assert_eq!(parse_max_query_symbols(Some("50".to_string())), 50);
    }

    #[test]
    fn test_parse_default_watchlist() {
        let defaults = parse_default_watchlist(None);
        assert_eq!(defaults.len(), DEFAULT_WATCHLIST_SYMBOLS.len());

        let parsed = parse_default_watchlist(Some(" aapl, 0700.hk ,,".to_string()));
        assert_eq!(parsed, vec!["AAPL".to_string(), "0700.HK".to_string()]);
    }
}
