//! 내부 일일 갱신 트리거 endpoint.
//!
//! 스케줄러(cron 등)가 호출하는 토큰 보호 엔드포인트입니다.
//! 독립 실행 업데이터 바이너리와 같은 갱신 경로를 사용합니다.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};

use pricehub_data::{run_daily_update, DailyUpdateOptions, DailyUpdateResult};

use crate::routes::{data_error, ApiError, ErrorResponse};
use crate::state::AppState;

fn unauthorized(message: &str) -> ErrorResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
        }),
    )
}

/// Authorization: Bearer 토큰을 검증합니다.
fn check_update_token(state: &AppState, headers: &HeaderMap) -> Result<(), ErrorResponse> {
    if state.env.update_api_token.is_empty() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError {
                code: "UPDATE_DISABLED".to_string(),
                message: "UPDATE_API_TOKEN is not configured".to_string(),
            }),
        ));
    }

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if token == state.env.update_api_token => Ok(()),
        Some(_) => Err(unauthorized("invalid update token")),
        None => Err(unauthorized("missing bearer token")),
    }
}

/// 일일 갱신 실행.
///
/// POST /api/v1/internal/update-daily
async fn trigger_daily_update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DailyUpdateResult>, ErrorResponse> {
    check_update_token(&state, &headers)?;

    let options = DailyUpdateOptions {
        default_watchlist: state.env.default_watchlist.clone(),
        ..Default::default()
    };
    let result = run_daily_update(
        &state.prices,
        &state.watchlist,
        &state.job_log,
        &state.resolver,
        &options,
    )
    .await
    .map_err(data_error)?;

    Ok(Json(result))
}

/// 내부 갱신 라우터.
pub fn update_router() -> Router<Arc<AppState>> {
    Router::new().route("/update-daily", post(trigger_daily_update))
}
