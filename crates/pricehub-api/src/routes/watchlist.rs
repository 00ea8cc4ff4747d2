//! 워치리스트 관리 endpoint.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/watchlist` - 목록 조회 (마지막 성공 갱신 시각 포함)
//! - `POST /api/v1/watchlist` - 심볼 추가/재활성화
//! - `DELETE /api/v1/watchlist/{symbol}` - 심볼 삭제

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use pricehub_core::validate_symbol;
use pricehub_data::WatchlistItem;

use crate::routes::{data_error, input_error, ErrorResponse};
use crate::state::AppState;

/// 워치리스트 응답.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistResponse {
    pub items: Vec<WatchlistItem>,
    /// 마지막으로 성공한 일일 갱신 시각 (ISO 8601)
    pub last_successful_update_at: Option<String>,
}

/// 심볼 추가 요청.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWatchSymbolRequest {
    pub symbol: String,
    pub display_name: Option<String>,
}

/// 워치리스트 조회.
///
/// GET /api/v1/watchlist
async fn list_watchlist(
    State(state): State<Arc<AppState>>,
) -> Result<Json<WatchlistResponse>, ErrorResponse> {
    state.ensure_default_watchlist().await.map_err(data_error)?;

    let records = state.watchlist.list_records(false).await.map_err(data_error)?;
    let last_successful_update_at = state
        .job_log
        .last_successful_update_at()
        .await
        .map_err(data_error)?
        .map(|at| at.to_rfc3339());

    Ok(Json(WatchlistResponse {
        items: records.into_iter().map(WatchlistItem::from).collect(),
        last_successful_update_at,
    }))
}

/// 심볼 추가/재활성화.
///
/// POST /api/v1/watchlist
async fn add_watch_symbol(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddWatchSymbolRequest>,
) -> Result<(StatusCode, Json<WatchlistItem>), ErrorResponse> {
    let symbol = validate_symbol(&request.symbol).map_err(input_error)?;
    let record = state
        .watchlist
        .upsert_symbol(&symbol, request.display_name.as_deref())
        .await
        .map_err(data_error)?;

    Ok((StatusCode::CREATED, Json(WatchlistItem::from(record))))
}

/// 심볼 삭제.
///
/// DELETE /api/v1/watchlist/{symbol}
async fn remove_watch_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    let symbol = validate_symbol(&symbol).map_err(input_error)?;
    state
        .watchlist
        .remove_symbol(&symbol)
        .await
        .map_err(data_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// 워치리스트 라우터.
pub fn watchlist_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_watchlist).post(add_watch_symbol))
        .route("/{symbol}", delete(remove_watch_symbol))
}
