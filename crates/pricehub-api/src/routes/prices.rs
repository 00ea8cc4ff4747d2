//! 가격 시리즈 조회 endpoint.
//!
//! 읽기는 항상 로컬 저장소에서 응답합니다. 저장 데이터가 전혀 없는
//! 심볼만 동기 하이드레이션으로 최초 적재하고, 이미 알고 있는 심볼의
//! 꼬리는 백그라운드 갱신 스케줄러에 맡깁니다 (응답을 막지 않음).

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use pricehub_core::{build_date_range, date_key, parse_symbols_input, SymbolSeries};
use pricehub_data::{
    filter_hydration_warnings, hydrate_missing_history, RefreshSource,
};

use crate::routes::{data_error, input_error, ErrorResponse};
use crate::state::AppState;

/// 가격 시리즈 조회 쿼리.
#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    /// 공백/쉼표 구분 심볼 목록
    pub symbols: Option<String>,
    /// 시작 날짜 (YYYY-MM-DD, 기본: to - 1년)
    pub from: Option<String>,
    /// 끝 날짜 (YYYY-MM-DD, 기본: 오늘)
    pub to: Option<String>,
}

/// 응답의 실제 조회 범위.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeResponse {
    pub from: String,
    pub to: String,
}

/// 가격 시리즈 응답.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQueryResponse {
    pub range: RangeResponse,
    pub series: Vec<SymbolSeries>,
    pub warnings: Vec<String>,
}

/// 가격 시리즈 조회.
///
/// GET /api/v1/prices?symbols=AAPL,MSFT&from=2024-01-01&to=2024-03-01
async fn get_prices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<PriceQueryResponse>, ErrorResponse> {
    let symbols = parse_symbols_input(
        query.symbols.as_deref().unwrap_or(""),
        state.env.max_query_symbols,
    )
    .map_err(input_error)?;
    let range =
        build_date_range(query.from.as_deref(), query.to.as_deref()).map_err(input_error)?;

    let mut warnings: Vec<String> = Vec::new();

    // 저장 데이터가 전혀 없는 심볼만 동기적으로 최초 적재
    let bounds = state
        .prices
        .trade_date_bounds(&symbols)
        .await
        .map_err(data_error)?;
    let (known_symbols, new_symbols): (Vec<String>, Vec<String>) = symbols
        .iter()
        .cloned()
        .partition(|symbol| bounds.contains_key(symbol));

    if !new_symbols.is_empty() {
        hydrate_missing_history(
            &state.prices,
            &state.resolver,
            &new_symbols,
            &range,
            &mut warnings,
        )
        .await;
    }

    // 이미 알고 있는 심볼의 꼬리 갱신은 응답과 독립적으로 진행된다
    state
        .scheduler
        .schedule_tail_refresh(RefreshSource::Query, &known_symbols, range);

    let series = state
        .prices
        .price_series(&symbols, range.from, range.to)
        .await
        .map_err(data_error)?;

    let available_symbols: HashSet<String> =
        series.iter().map(|series| series.symbol.clone()).collect();
    for symbol in &symbols {
        if !available_symbols.contains(symbol) {
            warnings.push(format!("{symbol}: no data found in selected range"));
        }
    }

    let warnings = dedupe_warnings(filter_hydration_warnings(warnings, &available_symbols));

    debug!(
        source = "query",
        symbols = symbols.len(),
        series = series.len(),
        "저장소에서 가격 시리즈 응답"
    );

    Ok(Json(PriceQueryResponse {
        range: RangeResponse {
            from: date_key(range.from),
            to: date_key(range.to),
        },
        series,
        warnings,
    }))
}

/// 순서를 유지하며 중복 경고를 제거합니다.
fn dedupe_warnings(warnings: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    warnings
        .into_iter()
        .filter(|warning| seen.insert(warning.clone()))
        .collect()
}

/// 가격 조회 라우터.
pub fn prices_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_prices))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_warnings_preserves_order() {
        let warnings = vec![
            "b: second".to_string(),
            "a: first".to_string(),
            "b: second".to_string(),
        ];
        assert_eq!(
            dedupe_warnings(warnings),
            vec!["b: second".to_string(), "a: first".to_string()]
        );
    }
}
