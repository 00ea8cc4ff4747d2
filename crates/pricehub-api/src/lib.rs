//! 가격 이력 조회 REST API 서버.
//!
//! 엔드포인트:
//! - `GET /health` - 헬스 체크
//! - `GET /api/v1/prices` - 가격 시리즈 조회 (최초 적재 하이드레이션 포함)
//! - `GET /api/v1/prices/matrix` - 매트릭스 뷰 (백그라운드 꼬리 갱신 트리거)
//! - `GET|POST /api/v1/watchlist`, `DELETE /api/v1/watchlist/{symbol}` - 워치리스트 관리
//! - `POST /api/v1/internal/update-daily` - 토큰 보호 일일 갱신 트리거

pub mod routes;
pub mod state;

pub use routes::create_api_router;
pub use state::AppState;
