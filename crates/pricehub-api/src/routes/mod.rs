//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크
//! - `/api/v1/prices` - 가격 시리즈 조회
//! - `/api/v1/prices/matrix` - 매트릭스 뷰
//! - `/api/v1/watchlist` - 워치리스트 관리
//! - `/api/v1/internal/update-daily` - 일일 갱신 트리거 (토큰 보호)

pub mod health;
pub mod matrix;
pub mod prices;
pub mod update;
pub mod watchlist;

pub use health::{health_router, HealthResponse};
pub use matrix::{matrix_router, MatrixPriceResponse, MatrixRow};
pub use prices::{prices_router, PriceQueryResponse};
pub use update::update_router;
pub use watchlist::{watchlist_router, WatchlistResponse};

use axum::http::StatusCode;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pricehub_core::PricehubError;
use pricehub_data::DataError;

use crate::state::AppState;

/// API 에러 응답 본문.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// 핸들러 에러 응답 타입.
pub type ErrorResponse = (StatusCode, Json<ApiError>);

/// 입력 검증 에러를 400 응답으로 매핑합니다.
pub(crate) fn input_error(err: PricehubError) -> ErrorResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            code: "INVALID_INPUT".to_string(),
            message: err.to_string(),
        }),
    )
}

/// 저장소 에러를 상태 코드로 매핑합니다.
pub(crate) fn data_error(err: DataError) -> ErrorResponse {
    let (status, code) = match &err {
        DataError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    (
        status,
        Json(ApiError {
            code: code.to_string(),
            message: err.to_string(),
        }),
    )
}

/// 전체 API 라우터 생성.
///
/// 모든 서브 라우터를 조합하여 하나의 라우터로 반환합니다.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/prices", prices_router().merge(matrix_router()))
        .nest("/api/v1/watchlist", watchlist_router())
        .nest("/api/v1/internal", update_router())
}
