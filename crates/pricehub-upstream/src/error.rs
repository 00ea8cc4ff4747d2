//! 업스트림 실패 분류.
//!
//! 업스트림은 구조화된 에러 대신 HTML 에러 페이지, 403/429,
//! 깨진 페이로드를 돌려줄 수 있으므로 모든 실패를 네 가지로 분류합니다.
//! NotFound만 다음 심볼 후보 시도를 허용하는 비치명 분류입니다.

use thiserror::Error;

/// 업스트림 조회 실패.
///
/// 모든 변형은 어떤 심볼 조회가 실패했는지 함께 전달합니다.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// 심볼에 대한 데이터 없음 (상장폐지, 미등록 티커, 빈 결과)
    #[error("{symbol}: {message}")]
    NotFound { symbol: String, message: String },

    /// 차단 또는 비정상 응답 (비 2xx 상태, HTML 페이로드)
    #[error("{symbol}: {message}")]
    Blocked { symbol: String, message: String },

    /// 2xx 응답이지만 파싱 불가능한 페이로드
    #[error("{symbol}: {message}")]
    Malformed { symbol: String, message: String },

    /// 고정 타임아웃 초과
    #[error("{symbol}: request timed out after {timeout_secs}s")]
    Timeout { symbol: String, timeout_secs: u64 },
}

/// 업스트림 작업을 위한 Result 타입.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

impl UpstreamError {
    /// 실패한 조회의 심볼.
    pub fn symbol(&self) -> &str {
        match self {
            UpstreamError::NotFound { symbol, .. }
            | UpstreamError::Blocked { symbol, .. }
            | UpstreamError::Malformed { symbol, .. }
            | UpstreamError::Timeout { symbol, .. } => symbol,
        }
    }

    /// 다음 후보 시도를 허용하는 "데이터 없음" 분류인지 확인합니다.
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::NotFound { .. })
    }

    /// 심볼 접두사를 제외한 실패 사유 문자열.
    pub fn detail(&self) -> String {
        match self {
            UpstreamError::NotFound { message, .. }
            | UpstreamError::Blocked { message, .. }
            | UpstreamError::Malformed { message, .. } => message.clone(),
            UpstreamError::Timeout { timeout_secs, .. } => {
                format!("request timed out after {timeout_secs}s")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let not_found = UpstreamError::NotFound {
            symbol: "AAPL".to_string(),
            message: "no data".to_string(),
        };
        assert!(not_found.is_not_found());
        assert_eq!(not_found.symbol(), "AAPL");

        let blocked = UpstreamError::Blocked {
            symbol: "AAPL".to_string(),
            message: "HTTP 403".to_string(),
        };
        assert!(!blocked.is_not_found());
    }
}
