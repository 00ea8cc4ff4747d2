//! 매트릭스 뷰 endpoint.
//!
//! 워치리스트(또는 임시 심볼 목록)의 최근 거래일별 종가를 표 형태로
//! 반환합니다. 응답은 항상 로컬 저장소에서 만들어지고, 각 심볼의
//! 꼬리 갱신은 응답 후 백그라운드에서 진행됩니다.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pricehub_core::{
    build_date_range, date_key, infer_region_from_symbol, parse_symbols_input, reference_today,
    DateRange, PricehubError,
};
use pricehub_data::{RefreshSource, WatchSymbolRecord};
use pricehub_upstream::QuoteMetadata;

use crate::routes::{data_error, input_error, ErrorResponse};
use crate::state::AppState;

/// 프리셋이 아닌 조회의 기본 적재 범위 (2년).
const MATRIX_PULL_LOOKBACK_MONTHS: u32 = 24;

/// 자동 메타데이터 재수집 주기 (일).
const META_REFRESH_DAYS: i64 = 7;

/// 매트릭스 표시 날짜 형식 (YY.MM.DD).
const DISPLAY_DATE_FORMAT: &str = "%y.%m.%d";

/// 매트릭스 조회 쿼리.
#[derive(Debug, Deserialize)]
pub struct MatrixQuery {
    /// "watchlist" (기본) 또는 "adhoc"
    pub mode: Option<String>,
    /// "7" | "30" | "90" (기본) | "custom"
    pub preset: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// adhoc 모드의 심볼 목록
    pub symbols: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatrixMode {
    Watchlist,
    Adhoc,
}

impl MatrixMode {
    fn as_str(&self) -> &'static str {
        match self {
            MatrixMode::Watchlist => "watchlist",
            MatrixMode::Adhoc => "adhoc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatrixPreset {
    Seven,
    Thirty,
    Ninety,
    Custom,
}

impl MatrixPreset {
    fn as_str(&self) -> &'static str {
        match self {
            MatrixPreset::Seven => "7",
            MatrixPreset::Thirty => "30",
            MatrixPreset::Ninety => "90",
            MatrixPreset::Custom => "custom",
        }
    }

    /// 프리셋이 보여줄 최근 거래일 수.
    fn take_days(&self) -> Option<usize> {
        match self {
            MatrixPreset::Seven => Some(7),
            MatrixPreset::Thirty => Some(30),
            MatrixPreset::Ninety => Some(90),
            MatrixPreset::Custom => None,
        }
    }
}

fn parse_mode(raw: Option<&str>) -> Result<MatrixMode, PricehubError> {
    match raw {
        None | Some("") | Some("watchlist") => Ok(MatrixMode::Watchlist),
        Some("adhoc") => Ok(MatrixMode::Adhoc),
        Some(_) => Err(PricehubError::Input(
            "mode must be watchlist or adhoc".to_string(),
        )),
    }
}

fn parse_preset(raw: Option<&str>) -> Result<MatrixPreset, PricehubError> {
    match raw {
        None | Some("") | Some("30") => Ok(MatrixPreset::Thirty),
        Some("7") => Ok(MatrixPreset::Seven),
        Some("90") => Ok(MatrixPreset::Ninety),
        Some("custom") => Ok(MatrixPreset::Custom),
        Some(_) => Err(PricehubError::Input(
            "preset must be 7, 30, 90, or custom".to_string(),
        )),
    }
}

/// 적재 범위 선택 결과.
struct RangeSelection {
    preset: MatrixPreset,
    pull_range: DateRange,
    fallback_from: String,
    fallback_to: String,
}

fn build_range_selection(
    preset: MatrixPreset,
    from_raw: Option<&str>,
    to_raw: Option<&str>,
) -> Result<RangeSelection, PricehubError> {
    if preset == MatrixPreset::Custom {
        if from_raw.is_none() || to_raw.is_none() {
            return Err(PricehubError::Input(
                "from and to are required when preset=custom".to_string(),
            ));
        }
        let range = build_date_range(from_raw, to_raw)?;
        return Ok(RangeSelection {
            preset,
            pull_range: range,
            fallback_from: date_key(range.from),
            fallback_to: date_key(range.to),
        });
    }

    // 프리셋 조회는 최근 2년을 적재 범위로 사용한다
    let to = reference_today();
    let from = to
        .checked_sub_months(Months::new(MATRIX_PULL_LOOKBACK_MONTHS))
        .unwrap_or(to);
    let pull_range = DateRange { from, to };

    Ok(RangeSelection {
        preset,
        pull_range,
        fallback_from: date_key(from),
        fallback_to: date_key(to),
    })
}

/// 심볼별로 해석된 표시용 메타데이터.
struct ResolvedSymbolMeta {
    name: String,
    region: String,
    auto_currency: Option<String>,
}

fn resolve_name(record: Option<&WatchSymbolRecord>, fallback_symbol: &str) -> String {
    record
        .and_then(|record| {
            record
                .display_name
                .as_deref()
                .or(record.auto_name.as_deref())
        })
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback_symbol.to_string())
}

fn resolve_region(record: Option<&WatchSymbolRecord>, fallback_symbol: &str) -> String {
    record
        .and_then(|record| record.auto_region.as_deref())
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| infer_region_from_symbol(fallback_symbol))
}

fn should_refresh_meta(record: &WatchSymbolRecord, now: DateTime<Utc>) -> bool {
    let Some(meta_updated_at) = record.meta_updated_at else {
        return true;
    };
    if record.auto_name.is_none() || record.auto_region.is_none() || record.auto_currency.is_none()
    {
        return true;
    }
    (now - meta_updated_at).num_days() >= META_REFRESH_DAYS
}

/// 매트릭스 범위 응답.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRangeResponse {
    pub from: String,
    pub to: String,
    pub preset: String,
}

/// 매트릭스 행 (한 심볼).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub symbol: String,
    pub name: String,
    pub region: String,
    pub currency: String,
    pub latest_close: Option<Decimal>,
    /// 거래일(YYYY-MM-DD) → 종가 (해당 일 데이터가 없으면 null)
    pub prices_by_date: BTreeMap<String, Option<Decimal>>,
}

/// 매트릭스 응답.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixPriceResponse {
    pub mode: String,
    pub range: MatrixRangeResponse,
    /// 선택된 거래일 (최신 먼저)
    pub dates: Vec<String>,
    /// 표시용 날짜 (YY.MM.DD, dates와 같은 순서)
    pub display_dates: Vec<String>,
    pub rows: Vec<MatrixRow>,
    pub warnings: Vec<String>,
}

/// 프리셋에 해당하는 최근 거래일 키를 고릅니다 (최신 먼저).
fn select_trade_dates(preset: MatrixPreset, all_date_keys: &[String]) -> Vec<String> {
    let ordered: &[String] = match preset.take_days() {
        Some(take) if all_date_keys.len() > take => &all_date_keys[all_date_keys.len() - take..],
        _ => all_date_keys,
    };
    ordered.iter().rev().cloned().collect()
}

/// 워치리스트/임시 심볼의 메타데이터를 해석합니다.
///
/// 자동 메타데이터가 없거나 오래된 워치리스트 심볼은 업스트림 프로브로
/// 재수집합니다. 프로브 실패는 진단 로그로만 남고 응답을 막지 않습니다.
async fn resolve_symbol_meta(
    state: &AppState,
    symbols: &[String],
    record_map: &HashMap<String, WatchSymbolRecord>,
    probe_unknown: bool,
) -> HashMap<String, ResolvedSymbolMeta> {
    let now = Utc::now();
    let mut meta_map = HashMap::new();

    for symbol in symbols {
        let record = record_map.get(symbol);

        let refreshed: Option<QuoteMetadata> = match record {
            Some(record) if should_refresh_meta(record, now) => {
                match state.chart.fetch_quote_metadata(symbol).await {
                    Ok(meta) => {
                        if let Err(error) = state.watchlist.update_auto_meta(symbol, &meta).await {
                            debug!(symbol = %symbol, error = %error, "자동 메타데이터 저장 실패");
                        }
                        Some(meta)
                    }
                    Err(error) => {
                        debug!(symbol = %symbol, error = %error, "메타데이터 재수집 실패");
                        None
                    }
                }
            }
            Some(_) => None,
            None if probe_unknown => match state.chart.fetch_quote_metadata(symbol).await {
                Ok(meta) => Some(meta),
                Err(error) => {
                    debug!(symbol = %symbol, error = %error, "메타데이터 조회 실패");
                    None
                }
            },
            None => None,
        };

        let meta = match (record, refreshed) {
            // 재수집된 메타데이터가 레코드 값보다 최신이다
            (record, Some(fresh)) => ResolvedSymbolMeta {
                name: record
                    .and_then(|r| r.display_name.clone())
                    .or(fresh.name)
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| symbol.clone()),
                region: fresh
                    .region
                    .unwrap_or_else(|| infer_region_from_symbol(symbol)),
                auto_currency: fresh.currency,
            },
            (record, None) => ResolvedSymbolMeta {
                name: resolve_name(record, symbol),
                region: resolve_region(record, symbol),
                auto_currency: record.and_then(|r| r.auto_currency.clone()),
            },
        };

        meta_map.insert(symbol.clone(), meta);
    }

    meta_map
}

/// 매트릭스 뷰 조회.
///
/// GET /api/v1/prices/matrix?mode=watchlist&preset=30
async fn get_matrix(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MatrixQuery>,
) -> Result<Json<MatrixPriceResponse>, ErrorResponse> {
    let mut warnings: Vec<String> = Vec::new();
    let mode = parse_mode(query.mode.as_deref()).map_err(input_error)?;
    let preset = parse_preset(query.preset.as_deref()).map_err(input_error)?;
    let selection = build_range_selection(preset, query.from.as_deref(), query.to.as_deref())
        .map_err(input_error)?;

    let (symbols, record_map) = match mode {
        MatrixMode::Watchlist => {
            state
                .ensure_default_watchlist()
                .await
                .map_err(data_error)?;
            let records = state.watchlist.list_records(true).await.map_err(data_error)?;
            let symbols: Vec<String> = records.iter().map(|r| r.symbol.clone()).collect();
            let record_map: HashMap<String, WatchSymbolRecord> = records
                .into_iter()
                .map(|record| (record.symbol.clone(), record))
                .collect();
            (symbols, record_map)
        }
        MatrixMode::Adhoc => {
            let symbols = parse_symbols_input(
                query.symbols.as_deref().unwrap_or(""),
                state.env.max_query_symbols,
            )
            .map_err(input_error)?;
            let record_map = state
                .watchlist
                .records_by_symbols(&symbols)
                .await
                .map_err(data_error)?;
            (symbols, record_map)
        }
    };

    if symbols.is_empty() {
        return Ok(Json(MatrixPriceResponse {
            mode: mode.as_str().to_string(),
            range: MatrixRangeResponse {
                from: selection.fallback_from,
                to: selection.fallback_to,
                preset: selection.preset.as_str().to_string(),
            },
            dates: Vec::new(),
            display_dates: Vec::new(),
            rows: Vec::new(),
            warnings: vec!["no symbols available".to_string()],
        }));
    }

    let price_rows = state
        .prices
        .daily_price_rows(&symbols, selection.pull_range.from, selection.pull_range.to)
        .await
        .map_err(data_error)?;
    let snapshots = state
        .prices
        .latest_snapshots(&symbols)
        .await
        .map_err(data_error)?;
    let meta_map = resolve_symbol_meta(
        &state,
        &symbols,
        &record_map,
        mode == MatrixMode::Adhoc,
    )
    .await;

    // 범위 내 모든 거래일 키 (오름차순, 중복 제거)
    let mut all_date_keys: Vec<String> = Vec::new();
    {
        let mut seen: HashSet<String> = HashSet::new();
        for row in &price_rows {
            let key = date_key(row.trade_date);
            if seen.insert(key.clone()) {
                all_date_keys.push(key);
            }
        }
        all_date_keys.sort();
    }
    let selected_date_keys = select_trade_dates(selection.preset, &all_date_keys);

    if selected_date_keys.is_empty() {
        warnings.push("no trade-day prices found in selected range".to_string());
    }

    let selected_set: HashSet<&String> = selected_date_keys.iter().collect();
    let mut close_by_symbol_date: HashMap<&str, HashMap<String, Decimal>> = HashMap::new();
    for row in &price_rows {
        let key = date_key(row.trade_date);
        if !selected_set.contains(&key) {
            continue;
        }
        close_by_symbol_date
            .entry(row.symbol.as_str())
            .or_default()
            .insert(key, row.close);
    }

    let rows: Vec<MatrixRow> = symbols
        .iter()
        .map(|symbol| {
            let close_by_date = close_by_symbol_date.get(symbol.as_str());
            let prices_by_date: BTreeMap<String, Option<Decimal>> = selected_date_keys
                .iter()
                .map(|key| {
                    (
                        key.clone(),
                        close_by_date.and_then(|by_date| by_date.get(key).copied()),
                    )
                })
                .collect();

            let snapshot = snapshots.get(symbol);
            let meta = meta_map.get(symbol);

            MatrixRow {
                symbol: symbol.clone(),
                name: meta
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| symbol.clone()),
                region: meta
                    .map(|m| m.region.clone())
                    .unwrap_or_else(|| infer_region_from_symbol(symbol)),
                currency: snapshot
                    .map(|s| s.currency.clone())
                    .or_else(|| meta.and_then(|m| m.auto_currency.clone()))
                    .unwrap_or_else(|| "N/A".to_string()),
                latest_close: snapshot.map(|s| s.close),
                prices_by_date,
            }
        })
        .collect();

    debug!(
        source = "matrix",
        symbols = symbols.len(),
        rows = price_rows.len(),
        "저장소에서 매트릭스 응답"
    );

    // 응답과 독립적으로 꼬리 갱신을 검토한다 (절대 응답을 막지 않음)
    state
        .scheduler
        .schedule_tail_refresh(RefreshSource::Matrix, &symbols, selection.pull_range);

    let from = selected_date_keys
        .last()
        .cloned()
        .unwrap_or(selection.fallback_from);
    let to = selected_date_keys
        .first()
        .cloned()
        .unwrap_or(selection.fallback_to);

    let display_dates = selected_date_keys
        .iter()
        .filter_map(|key| {
            chrono::NaiveDate::parse_from_str(key, "%Y-%m-%d")
                .ok()
                .map(|date| date.format(DISPLAY_DATE_FORMAT).to_string())
        })
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let warnings = warnings
        .into_iter()
        .filter(|warning| seen.insert(warning.clone()))
        .collect();

    Ok(Json(MatrixPriceResponse {
        mode: mode.as_str().to_string(),
        range: MatrixRangeResponse {
            from,
            to,
            preset: selection.preset.as_str().to_string(),
        },
        dates: selected_date_keys,
        display_dates,
        rows,
        warnings,
    }))
}

/// 매트릭스 라우터.
pub fn matrix_router() -> Router<Arc<AppState>> {
    Router::new().route("/matrix", get(get_matrix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode(None).unwrap(), MatrixMode::Watchlist);
        assert_eq!(parse_mode(Some("watchlist")).unwrap(), MatrixMode::Watchlist);
        assert_eq!(parse_mode(Some("adhoc")).unwrap(), MatrixMode::Adhoc);
        assert!(parse_mode(Some("other")).is_err());
    }

    #[test]
    fn test_parse_preset() {
        assert_eq!(parse_preset(None).unwrap(), MatrixPreset::Thirty);
        assert_eq!(parse_preset(Some("7")).unwrap(), MatrixPreset::Seven);
        assert_eq!(parse_preset(Some("custom")).unwrap(), MatrixPreset::Custom);
        assert!(parse_preset(Some("365")).is_err());
    }

    #[test]
    fn test_build_range_selection_custom_requires_dates() {
        assert!(build_range_selection(MatrixPreset::Custom, None, None).is_err());
        let selection = build_range_selection(
            MatrixPreset::Custom,
            Some("2024-01-01"),
            Some("2024-02-01"),
        )
        .unwrap();
        assert_eq!(selection.fallback_from, "2024-01-01");
        assert_eq!(selection.fallback_to, "2024-02-01");
    }

    #[test]
    fn test_select_trade_dates_takes_recent_and_reverses() {
        let keys: Vec<String> = (1..=10)
            .map(|day| format!("2024-01-{day:02}"))
            .collect();

        let selected = select_trade_dates(MatrixPreset::Seven, &keys);
        assert_eq!(selected.len(), 7);
        assert_eq!(selected[0], "2024-01-10");
        assert_eq!(selected[6], "2024-01-04");

        let all = select_trade_dates(MatrixPreset::Custom, &keys);
        assert_eq!(all.len(), 10);
        assert_eq!(all[0], "2024-01-10");
    }

    #[test]
    fn test_should_refresh_meta() {
        let base = WatchSymbolRecord {
            symbol: "AAPL".to_string(),
            display_name: None,
            enabled: true,
            auto_name: Some("Apple Inc.".to_string()),
            auto_region: Some("US".to_string()),
            auto_currency: Some("USD".to_string()),
            meta_updated_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!should_refresh_meta(&base, Utc::now()));

        let missing_meta = WatchSymbolRecord {
            auto_region: None,
            ..base.clone()
        };
        assert!(should_refresh_meta(&missing_meta, Utc::now()));

        let stale = WatchSymbolRecord {
            meta_updated_at: Some(Utc::now() - chrono::Duration::days(META_REFRESH_DAYS + 1)),
            ..base.clone()
        };
        assert!(should_refresh_meta(&stale, Utc::now()));

        let never = WatchSymbolRecord {
            meta_updated_at: None,
            ..base
        };
        assert!(should_refresh_meta(&never, Utc::now()));
    }

    #[test]
    fn test_resolve_name_and_region_fallbacks() {
        assert_eq!(resolve_name(None, "0700.HK"), "0700.HK");
        assert_eq!(resolve_region(None, "0700.HK"), "Hong Kong");
    }
}
