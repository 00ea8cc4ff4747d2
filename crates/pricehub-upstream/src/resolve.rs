//! 심볼 후보 확장 및 순차 해석.
//!
//! 사용자가 입력한 심볼 하나가 업스트림에서는 지역 접미사가 붙은
//! 변형으로만 존재할 수 있습니다 (예: 브라질 "PETR3" → "PETR3.SA").
//! 후보를 순서대로 시도하여 처음 데이터를 돌려주는 티커를 채택합니다.

use std::sync::Arc;

use tracing::debug;

use pricehub_core::{FetchedPricePoint, RefreshWindow};

use crate::chart::ChartClient;
use crate::error::{UpstreamError, UpstreamResult};
use crate::sanitize::MessageNormalizer;

/// 해석에 성공한 시리즈.
#[derive(Debug, Clone)]
pub struct ResolvedSeries {
    /// 사용자가 입력한 원본 심볼
    pub source_symbol: String,
    /// 실제로 데이터를 돌려준 업스트림 티커
    pub resolved_symbol: String,
    /// 조회된 가격 포인트 (날짜 오름차순)
    pub points: Vec<FetchedPricePoint>,
}

/// 브라질 티커 형태인지 확인 (영문 4자 + 숫자 1자, 예: PETR3).
fn is_brazil_style(symbol: &str) -> bool {
    let chars: Vec<char> = symbol.chars().collect();
    chars.len() == 5
        && chars[..4].iter().all(|c| c.is_ascii_uppercase())
        && chars[4].is_ascii_digit()
}

/// 중국 본토 티커 형태인지 확인 (숫자 6자, 예: 300750).
fn is_mainland_china_style(symbol: &str) -> bool {
    symbol.len() == 6 && symbol.chars().all(|c| c.is_ascii_digit())
}

/// 입력 심볼에서 업스트림 티커 후보 목록을 만듭니다.
///
/// 정규화(공백 제거, 대문자)된 입력이 항상 첫 번째 후보이며,
/// 순서를 유지한 채 중복을 제거합니다.
pub fn candidates(symbol: &str) -> Vec<String> {
    let normalized = symbol.trim().to_uppercase();
    let mut result = vec![normalized.clone()];

    if is_brazil_style(&normalized) {
        result.push(format!("{normalized}.SA"));
    }
    if is_mainland_china_style(&normalized) {
        result.push(format!("{normalized}.SZ"));
        result.push(format!("{normalized}.SS"));
    }

    let mut deduped: Vec<String> = Vec::with_capacity(result.len());
    for candidate in result {
        if !deduped.contains(&candidate) {
            deduped.push(candidate);
        }
    }
    deduped
}

/// 후보를 순서대로 시도하는 심볼 해석기.
#[derive(Clone)]
pub struct SymbolResolver {
    client: Arc<ChartClient>,
    normalizer: MessageNormalizer,
}

impl SymbolResolver {
    /// 새 해석기를 생성합니다.
    pub fn new(client: Arc<ChartClient>) -> Self {
        Self {
            client,
            normalizer: MessageNormalizer::default(),
        }
    }

    /// 공유 중인 차트 클라이언트.
    pub fn chart_client(&self) -> &Arc<ChartClient> {
        &self.client
    }

    /// 후보를 순서대로 시도하여 일봉 이력을 해석합니다.
    ///
    /// 첫 번째로 데이터를 돌려준 후보가 즉시 채택됩니다.
    /// "데이터 없음" 실패는 다음 후보로 넘어가고, 그 외 실패는 모든
    /// 후보가 실패했을 때 우선적으로 보고할 에러로 기억해 둡니다.
    pub async fn resolve_daily_history(
        &self,
        symbol: &str,
        window: &RefreshWindow,
    ) -> UpstreamResult<ResolvedSeries> {
        let source_symbol = symbol.trim().to_uppercase();
        let mut preferred_error: Option<UpstreamError> = None;
        let mut last_error: Option<UpstreamError> = None;

        for candidate in candidates(&source_symbol) {
            match self.client.fetch_daily_history(&candidate, window).await {
                Ok(points) => {
                    if candidate != source_symbol {
                        debug!(
                            source = %source_symbol,
                            resolved = %candidate,
                            "접미사 변형 후보로 해석됨"
                        );
                    }
                    return Ok(ResolvedSeries {
                        source_symbol,
                        resolved_symbol: candidate,
                        points,
                    });
                }
                Err(error) => {
                    if !error.is_not_found() && preferred_error.is_none() {
                        preferred_error = Some(error.clone());
                    }
                    last_error = Some(error);
                }
            }
        }

        let error = preferred_error.or(last_error).unwrap_or_else(|| {
            UpstreamError::NotFound {
                symbol: source_symbol.clone(),
                message: format!("quote data unavailable for {source_symbol}"),
            }
        });
        Err(self.normalized(error))
    }

    /// 에러 메시지를 정규화한 같은 분류의 에러로 바꿉니다.
    fn normalized(&self, error: UpstreamError) -> UpstreamError {
        match error {
            UpstreamError::NotFound { symbol, message } => UpstreamError::NotFound {
                symbol,
                message: self.normalizer.normalize(&message),
            },
            UpstreamError::Blocked { symbol, message } => UpstreamError::Blocked {
                symbol,
                message: self.normalizer.normalize(&message),
            },
            UpstreamError::Malformed { symbol, message } => UpstreamError::Malformed {
                symbol,
                message: self.normalizer.normalize(&message),
            },
            timeout @ UpstreamError::Timeout { .. } => timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pricehub_core::parse_date_key;

    fn window() -> RefreshWindow {
        RefreshWindow {
            from_date: parse_date_key("2024-01-01", "from").unwrap(),
            to_date: parse_date_key("2024-01-05", "to").unwrap(),
        }
    }

    const NOT_FOUND_BODY: &str = concat!(
        "{\"chart\":{\"result\":null,\"error\":{",
        "\"code\":\"Not Found\",",
        "\"description\":\"No data found, symbol may be delisted\"}}}"
    );

    fn chart_body(close: f64) -> String {
        format!(
            concat!(
                "{{\"chart\":{{\"result\":[{{",
                "\"meta\":{{\"currency\":\"BRL\"}},",
                "\"timestamp\":[1704164400],",
                "\"indicators\":{{\"quote\":[{{\"close\":[{}]}}]}}",
                "}}],\"error\":null}}}}"
            ),
            close
        )
    }

    #[test]
    fn test_candidates_brazil_suffix() {
        assert_eq!(candidates("PETR3"), vec!["PETR3", "PETR3.SA"]);
        assert_eq!(candidates(" petr3 "), vec!["PETR3", "PETR3.SA"]);
    }

    #[test]
    fn test_candidates_mainland_china_suffixes() {
        assert_eq!(
            candidates("300750"),
            vec!["300750", "300750.SZ", "300750.SS"]
        );
    }

    #[test]
    fn test_candidates_plain_symbol_unchanged() {
        assert_eq!(candidates("WTC.AX"), vec!["WTC.AX"]);
        assert_eq!(candidates("AAPL"), vec!["AAPL"]);
        // 접미사가 이미 붙은 6자리 티커는 변형 대상이 아니다
        assert_eq!(candidates("0700.HK"), vec!["0700.HK"]);
    }

    #[tokio::test]
    async fn test_resolution_falls_through_to_suffix_candidate() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/PETR3")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(NOT_FOUND_BODY)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/PETR3.SA")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(chart_body(37.5))
            .expect(1)
            .create_async()
            .await;

        let client = Arc::new(ChartClient::with_endpoints(
            server.url(),
            "http://unused.invalid/",
        ));
        let resolver = SymbolResolver::new(client);
        let resolved = resolver
            .resolve_daily_history("PETR3", &window())
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(resolved.source_symbol, "PETR3");
        assert_eq!(resolved.resolved_symbol, "PETR3.SA");
        assert_eq!(resolved.points.len(), 1);
    }

    #[tokio::test]
    async fn test_resolution_stops_at_first_success() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/300750")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(chart_body(180.0))
            .expect(1)
            .create_async()
            .await;
        let others = server
            .mock("GET", Matcher::Regex(r"^/300750\.(SZ|SS)$".to_string()))
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = Arc::new(ChartClient::with_endpoints(
            server.url(),
            "http://unused.invalid/",
        ));
        let resolver = SymbolResolver::new(client);
        let resolved = resolver
            .resolve_daily_history("300750", &window())
            .await
            .unwrap();

        first.assert_async().await;
        others.assert_async().await;
        assert_eq!(resolved.resolved_symbol, "300750");
    }

    #[tokio::test]
    async fn test_all_not_found_surfaces_last_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Regex(r"^/PETR3.*".to_string()))
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(NOT_FOUND_BODY)
            .expect(2)
            .create_async()
            .await;

        let client = Arc::new(ChartClient::with_endpoints(
            server.url(),
            "http://unused.invalid/",
        ));
        let resolver = SymbolResolver::new(client);
        let err = resolver
            .resolve_daily_history("PETR3", &window())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("delisted"));
    }

    #[tokio::test]
    async fn test_non_not_found_error_is_preferred() {
        let mut server = mockito::Server::new_async().await;
        // 첫 후보: 깨진 페이로드 (Malformed), 둘째 후보: 데이터 없음
        let _first = server
            .mock("GET", "/PETR3")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("garbage payload")
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/PETR3.SA")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(NOT_FOUND_BODY)
            .create_async()
            .await;

        let client = Arc::new(ChartClient::with_endpoints(
            server.url(),
            "http://unused.invalid/",
        ));
        let resolver = SymbolResolver::new(client);
        let err = resolver
            .resolve_daily_history("PETR3", &window())
            .await
            .unwrap_err();

        // NotFound가 아닌 실패가 더 많은 정보를 담으므로 우선된다
        assert!(matches!(err, UpstreamError::Malformed { .. }));
    }
}
