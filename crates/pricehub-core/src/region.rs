//! 심볼/거래소 이름 기반 지역 추론.
//!
//! 업스트림 메타데이터가 없거나 불완전할 때 심볼 접미사 또는
//! 거래소 이름 키워드로 표시용 지역을 추정합니다.

/// 티커 접미사 → 지역 매핑.
const SUFFIX_REGIONS: &[(&str, &str)] = &[
    (".HK", "Hong Kong"),
    (".SS", "China"),
    (".SZ", "China"),
    (".BJ", "China"),
    (".T", "Japan"),
    (".KS", "South Korea"),
    (".KQ", "South Korea"),
    (".TO", "Canada"),
    (".V", "Canada"),
    (".L", "United Kingdom"),
    (".PA", "France"),
    (".DE", "Germany"),
    (".F", "Germany"),
    (".SW", "Switzerland"),
    (".MI", "Italy"),
    (".AX", "Australia"),
    (".SA", "Brazil"),
    (".TW", "Taiwan"),
    (".NS", "India"),
    (".BO", "India"),
    (".SI", "Singapore"),
    (".JK", "Indonesia"),
    (".KL", "Malaysia"),
];

/// 거래소 이름 키워드 → 지역 매핑.
const EXCHANGE_KEYWORD_REGIONS: &[(&str, &str)] = &[
    ("hong kong", "Hong Kong"),
    ("shanghai", "China"),
    ("shenzhen", "China"),
    ("beijing", "China"),
    ("nasdaq", "US"),
    ("nyse", "US"),
    ("amex", "US"),
    ("tokyo", "Japan"),
    ("toronto", "Canada"),
    ("london", "United Kingdom"),
    ("frankfurt", "Germany"),
    ("sao", "Brazil"),
    ("b3", "Brazil"),
];

/// 심볼 접미사로 지역을 추론합니다.
///
/// 접미사가 매칭되지 않는 일반 티커는 US로 간주합니다.
pub fn infer_region_from_symbol(symbol: &str) -> String {
    let normalized = symbol.to_uppercase();
    if let Some((_, region)) = SUFFIX_REGIONS
        .iter()
        .find(|(suffix, _)| normalized.ends_with(suffix))
    {
        return (*region).to_string();
    }

    let plain_ticker = !normalized.is_empty()
        && normalized
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '^' | '.' | '-'));
    if plain_ticker {
        return "US".to_string();
    }

    "Unknown".to_string()
}

/// 거래소 이름 키워드로 지역을 추론하고, 없으면 심볼 접미사로 대체합니다.
pub fn infer_region_from_exchange(exchange_name: Option<&str>, symbol: &str) -> String {
    let normalized = exchange_name.unwrap_or_default().to_lowercase();
    if let Some((_, region)) = EXCHANGE_KEYWORD_REGIONS
        .iter()
        .find(|(keyword, _)| normalized.contains(keyword))
    {
        return (*region).to_string();
    }
    infer_region_from_symbol(symbol)
}
