//! 최초 적재용 동기 하이드레이션.
//!
//! 읽기 경로가 요청한 범위에서 선행/후행 누락 구간을 즉시 채웁니다.
//! 백그라운드 꼬리 갱신과 달리 호출자가 완료를 기다리며, 심볼 단위
//! 실패는 경고 문자열로만 수집되고 나머지 심볼 처리는 계속됩니다.

use std::collections::HashSet;

use tracing::{debug, warn};

use pricehub_core::{date_key, DateRange};
use pricehub_upstream::SymbolResolver;

use crate::refresh::gaps::{missing_windows_for_range, normalize_window_for_fetch};
use crate::store::PriceStore;

/// 하이드레이션 실패 경고 본문의 고정 접두사.
const HYDRATION_WARNING_PREFIX: &str = "failed to fetch missing historical data";

/// 요청 범위의 누락 구간을 동기적으로 채웁니다.
///
/// 심볼별로 선행 구간을 먼저, 후행 구간을 나중에 가져옵니다.
/// 한 구간이 실패하면 해당 심볼의 나머지 구간은 건너뛰고 경고를
/// 남기지만 다른 심볼 처리는 계속합니다.
pub async fn hydrate_missing_history(
    store: &dyn PriceStore,
    resolver: &SymbolResolver,
    symbols: &[String],
    range: &DateRange,
    warnings: &mut Vec<String>,
) {
    if symbols.is_empty() {
        return;
    }

    let bounds_by_symbol = match store.trade_date_bounds(symbols).await {
        Ok(bounds) => bounds,
        Err(error) => {
            warn!(error = %error, "하이드레이션용 저장 범위 조회 실패");
            return;
        }
    };

    for symbol in symbols {
        let bounds = bounds_by_symbol.get(symbol);
        let windows = missing_windows_for_range(range.from, range.to, bounds);

        for window in windows {
            let fetch_window = normalize_window_for_fetch(window);

            debug!(
                symbol = %symbol,
                from = %date_key(fetch_window.from_date),
                to = %date_key(fetch_window.to_date),
                "누락 구간 하이드레이션"
            );

            match resolver.resolve_daily_history(symbol, &fetch_window).await {
                Ok(resolved) => {
                    if resolved.points.is_empty() {
                        continue;
                    }
                    if let Err(error) = store.upsert_daily_prices(symbol, &resolved.points).await {
                        warnings.push(format!(
                            "{symbol}: {HYDRATION_WARNING_PREFIX} ({error})"
                        ));
                        break;
                    }
                }
                Err(error) => {
                    warnings.push(format!(
                        "{symbol}: {HYDRATION_WARNING_PREFIX} ({})",
                        error.detail()
                    ));
                    break;
                }
            }
        }
    }
}

fn extract_symbol_from_hydration_warning(warning: &str) -> Option<String> {
    let (symbol, message) = warning.split_once(':')?;
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return None;
    }
    if !message
        .trim()
        .to_lowercase()
        .starts_with(HYDRATION_WARNING_PREFIX)
    {
        return None;
    }
    Some(symbol)
}

/// 결과적으로 데이터가 있는 심볼의 하이드레이션 경고를 걸러냅니다.
///
/// 한 구간 조회가 실패했더라도 저장소에 데이터가 남아 응답이
/// 가능하다면 경고는 노이즈이므로 버립니다. 하이드레이션 경고가 아닌
/// 문자열은 그대로 유지합니다.
pub fn filter_hydration_warnings(
    warnings: Vec<String>,
    available_symbols: &HashSet<String>,
) -> Vec<String> {
    warnings
        .into_iter()
        .filter(|warning| match extract_symbol_from_hydration_warning(warning) {
            Some(symbol) => !available_symbols.contains(&symbol),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_drops_warning_for_available_symbol() {
        let warnings = vec![
            format!("AAPL: {HYDRATION_WARNING_PREFIX} (timeout)"),
            format!("MSFT: {HYDRATION_WARNING_PREFIX} (timeout)"),
        ];
        let available: HashSet<String> = ["AAPL".to_string()].into_iter().collect();

        let filtered = filter_hydration_warnings(warnings, &available);
        assert_eq!(filtered.len(), 1);
        assert!(filtered[0].starts_with("MSFT:"));
    }

    #[test]
    fn test_filter_keeps_non_hydration_warnings() {
        let warnings = vec!["AAPL: no data found in selected range".to_string()];
        let available: HashSet<String> = ["AAPL".to_string()].into_iter().collect();

        let filtered = filter_hydration_warnings(warnings, &available);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_extract_symbol_requires_prefix() {
        assert_eq!(
            extract_symbol_from_hydration_warning(&format!(
                "tsla: {HYDRATION_WARNING_PREFIX} (HTTP 500)"
            )),
            Some("TSLA".to_string())
        );
        assert_eq!(
            extract_symbol_from_hydration_warning("TSLA: something else"),
            None
        );
        assert_eq!(extract_symbol_from_hydration_warning("no colon here"), None);
    }
}
