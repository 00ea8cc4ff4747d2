//! 업스트림 시세 소스 연동.
//!
//! 이 crate는 다음을 제공합니다:
//! - 차트 API 클라이언트 (직접/릴레이 전송 전략, 15초 타임아웃)
//! - 심볼 후보 확장 및 순차 해석 (지역 접미사 변형)
//! - 업스트림 실패 분류 (NotFound/Blocked/Malformed/Timeout)
//! - 원시 에러 메시지 정규화 (HTML 제거, 길이 제한)

pub mod chart;
pub mod error;
pub mod resolve;
pub mod sanitize;

pub use chart::{ChartClient, QuoteMetadata};
pub use error::{UpstreamError, UpstreamResult};
pub use resolve::{candidates, ResolvedSeries, SymbolResolver};
pub use sanitize::{looks_like_html_document, MessageNormalizer};
