//! 업스트림 차트 API 클라이언트.
//!
//! 하나의 차트 엔드포인트에 대해 일봉 이력과 메타데이터를 조회합니다.
//!
//! # 전송 전략
//!
//! ```text
//! 요청
//!   │
//!   ▼
//! prefer_relay?
//!   │ false                        │ true
//!   ▼                              ▼
//! 직접 요청 (브라우저 UA) ──────> 릴레이 요청
//!   │ 401/403/429 또는 HTML 응답     │
//!   │ → prefer_relay = true         ▼
//!   └──────────────────────> 마크다운 래핑 해제 → JSON 파싱
//! ```
//!
//! prefer_relay는 인스턴스 상태이며 프로세스가 살아 있는 동안 유지됩니다.
//! 테스트 격리를 위해 `reset_transport_preference`를 제공합니다.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use pricehub_core::{
    date_key, date_key_from_unix, day_end_unix, day_start_unix, infer_region_from_exchange,
    FetchedPricePoint, RefreshWindow,
};

use crate::error::{UpstreamError, UpstreamResult};
use crate::sanitize::looks_like_html_document;

/// 기본 차트 API 엔드포인트.
const DEFAULT_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// 차단 시 사용하는 공개 read-through 릴레이.
const DEFAULT_RELAY_PREFIX: &str = "https://r.jina.ai/";

/// 릴레이 응답에서 원본 본문이 시작되는 마커.
const MARKDOWN_CONTENT_MARKER: &str = "Markdown Content:";

/// 메타데이터 프로브에 사용하는 range 토큰.
const METADATA_RANGE_TOKEN: &str = "5d";

/// 모든 시도에 적용되는 고정 타임아웃 (초).
const REQUEST_TIMEOUT_SECS: u64 = 15;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 심볼의 표시용 메타데이터 (가격 포인트 없이 조회 가능).
#[derive(Debug, Clone, Default)]
pub struct QuoteMetadata {
    /// 표시 이름 (longName/shortName 중 첫 번째 비어 있지 않은 값)
    pub name: Option<String>,
    /// 거래소 이름 키워드 또는 티커 접미사로 추론한 지역
    pub region: Option<String>,
    /// 통화 코드
    pub currency: Option<String>,
}

/// 차트 요청의 조회 구간 지정.
enum RangeSpec {
    /// 명시적 Unix 초 구간 (이력 조회)
    Window { period1: i64, period2: i64 },
    /// range 토큰 (메타데이터 프로브)
    Preset(&'static str),
}

/// 업스트림 차트 API 클라이언트.
///
/// 전송 선호 상태(prefer_relay)를 소유하는 명시적 인스턴스입니다.
/// 프로세스당 하나를 만들어 공유하세요.
pub struct ChartClient {
    client: Client,
    base_url: String,
    relay_prefix: String,
    /// 직접 전송이 차단된 뒤에는 프로세스 수명 동안 릴레이를 우선합니다.
    prefer_relay: AtomicBool,
}

impl ChartClient {
    /// 기본 엔드포인트로 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self::with_endpoints(DEFAULT_CHART_BASE_URL, DEFAULT_RELAY_PREFIX)
    }

    /// 엔드포인트를 지정하여 생성합니다 (테스트용).
    pub fn with_endpoints(base_url: impl Into<String>, relay_prefix: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("HTTP 클라이언트 생성 실패");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            relay_prefix: relay_prefix.into(),
            prefer_relay: AtomicBool::new(false),
        }
    }

    /// 릴레이 우선 상태를 초기화합니다 (테스트 격리용).
    pub fn reset_transport_preference(&self) {
        self.prefer_relay.store(false, Ordering::Relaxed);
    }

    /// 현재 릴레이 전송을 우선하는지 여부.
    pub fn prefers_relay(&self) -> bool {
        self.prefer_relay.load(Ordering::Relaxed)
    }

    /// 한 구간의 일봉 이력을 조회합니다.
    ///
    /// 날짜 키 기준으로 중복을 제거(마지막 값 우선)하고
    /// 오름차순으로 정렬하여 반환합니다.
    pub async fn fetch_daily_history(
        &self,
        symbol: &str,
        window: &RefreshWindow,
    ) -> UpstreamResult<Vec<FetchedPricePoint>> {
        let range = RangeSpec::Window {
            period1: day_start_unix(window.from_date),
            period2: day_end_unix(window.to_date),
        };
        let url = self.chart_url(symbol, &range);

        debug!(
            symbol = symbol,
            from = %date_key(window.from_date),
            to = %date_key(window.to_date),
            "차트 구간 조회"
        );

        let (body, status) = self.fetch_raw_body(symbol, &url).await?;
        let result = parse_chart_result(symbol, &body, status)?;
        Ok(extract_points(result))
    }

    /// 가격 포인트 없이 표시용 메타데이터만 조회합니다.
    pub async fn fetch_quote_metadata(&self, symbol: &str) -> UpstreamResult<QuoteMetadata> {
        let url = self.chart_url(symbol, &RangeSpec::Preset(METADATA_RANGE_TOKEN));

        debug!(symbol = symbol, "메타데이터 프로브 조회");

        let (body, status) = self.fetch_raw_body(symbol, &url).await?;
        let result = parse_chart_result(symbol, &body, status)?;
        let meta = result.meta.unwrap_or_default();

        let name = [meta.long_name, meta.short_name]
            .into_iter()
            .flatten()
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty());
        let exchange = meta.full_exchange_name.or(meta.exchange_name);
        let region = infer_region_from_exchange(exchange.as_deref(), symbol);
        let currency = meta.currency.filter(|value| !value.is_empty());

        Ok(QuoteMetadata {
            name,
            region: Some(region),
            currency,
        })
    }

    fn chart_url(&self, symbol: &str, range: &RangeSpec) -> String {
        let mut url = format!(
            "{}/{}?interval=1d&includePrePost=false&events=div,splits",
            self.base_url,
            url_encode_symbol(symbol)
        );
        match range {
            RangeSpec::Window { period1, period2 } => {
                let _ = write!(url, "&period1={period1}&period2={period2}");
            }
            RangeSpec::Preset(token) => {
                let _ = write!(url, "&range={token}");
            }
        }
        url
    }

    /// 전송 전략에 따라 응답 본문을 가져옵니다.
    ///
    /// 릴레이 응답은 마크다운 래핑이 해제된 상태로 반환됩니다.
    async fn fetch_raw_body(&self, symbol: &str, url: &str) -> UpstreamResult<(String, u16)> {
        if !self.prefers_relay() {
            match self.fetch_direct(symbol, url).await? {
                DirectOutcome::Body { text, status } => return Ok((text, status)),
                DirectOutcome::TransportBlocked { status } => {
                    self.prefer_relay.store(true, Ordering::Relaxed);
                    warn!(
                        symbol = symbol,
                        status = status,
                        "직접 전송 차단됨, 릴레이 전송으로 전환"
                    );
                }
            }
        }
        self.fetch_via_relay(symbol, url).await
    }

    async fn fetch_direct(&self, symbol: &str, url: &str) -> UpstreamResult<DirectOutcome> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport_error(symbol, &e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(symbol, &e))?;

        // 401/403/429 또는 HTML 응답이면 프로세스 수명 동안 릴레이로 전환
        if matches!(status, 401 | 403 | 429) || looks_like_html_document(&body) {
            return Ok(DirectOutcome::TransportBlocked { status });
        }

        Ok(DirectOutcome::Body { text: body, status })
    }

    async fn fetch_via_relay(&self, symbol: &str, url: &str) -> UpstreamResult<(String, u16)> {
        let relay_url = format!("{}{}", self.relay_prefix, strip_scheme(url));

        debug!(symbol = symbol, "릴레이 전송으로 요청");

        let response = self
            .client
            .get(&relay_url)
            .send()
            .await
            .map_err(|e| classify_transport_error(symbol, &e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(symbol, &e))?;

        if !status.is_success() {
            return Err(UpstreamError::Blocked {
                symbol: symbol.to_string(),
                message: format!("relay returned HTTP {}", status.as_u16()),
            });
        }

        Ok((unwrap_relay_body(&body).to_string(), status.as_u16()))
    }
}

impl Default for ChartClient {
    fn default() -> Self {
        Self::new()
    }
}

/// 직접 전송 시도의 결과.
enum DirectOutcome {
    /// 본문 수신 (상태 코드와 함께 파서로 전달)
    Body { text: String, status: u16 },
    /// 차단 분류 → 릴레이 재시도 필요
    TransportBlocked { status: u16 },
}

fn classify_transport_error(symbol: &str, error: &reqwest::Error) -> UpstreamError {
    if error.is_timeout() {
        return UpstreamError::Timeout {
            symbol: symbol.to_string(),
            timeout_secs: REQUEST_TIMEOUT_SECS,
        };
    }
    UpstreamError::Blocked {
        symbol: symbol.to_string(),
        message: format!("transport error: {error}"),
    }
}

/// 심볼을 URL 경로 세그먼트로 인코딩합니다 (`^GSPC` 등).
fn url_encode_symbol(symbol: &str) -> String {
    let mut encoded = String::with_capacity(symbol.len());
    for byte in symbol.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => {
                let _ = write!(encoded, "%{byte:02X}");
            }
        }
    }
    encoded
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map(|(_, rest)| rest).unwrap_or(url)
}

/// 릴레이 응답에서 원본 JSON 본문을 추출합니다.
///
/// `Markdown Content:` 마커 뒤의 첫 `{`부터를 JSON 조각으로 간주하며,
/// 마커가 없으면 본문 전체에 같은 규칙을 적용합니다.
fn unwrap_relay_body(body: &str) -> &str {
    let after_marker = body
        .find(MARKDOWN_CONTENT_MARKER)
        .map(|at| &body[at + MARKDOWN_CONTENT_MARKER.len()..])
        .unwrap_or(body);
    match after_marker.find('{') {
        Some(at) => &after_marker[at..],
        None => after_marker,
    }
}

/// 선행 JSON 값만 역직렬화합니다 (마크다운 래핑의 꼬리 텍스트 무시).
fn deserialize_leading_json<T: DeserializeOwned>(body: &str) -> Result<T, serde_json::Error> {
    let mut deserializer = serde_json::Deserializer::from_str(body);
    T::deserialize(&mut deserializer)
}

// =============================================================================
// 차트 응답 스키마
// =============================================================================

// 업스트림 JSON은 느슨한 형식이므로 모든 필드를 Option으로 두고
// 필드 단위로 검증합니다.

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Option<ChartBody>,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartApiError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<Option<i64>>>,
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    currency: Option<String>,
    #[serde(rename = "longName")]
    long_name: Option<String>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    #[serde(rename = "exchangeName")]
    exchange_name: Option<String>,
    #[serde(rename = "fullExchangeName")]
    full_exchange_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Option<Vec<ChartQuote>>,
    adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

/// 상장폐지/데이터 없음/미등록 티커를 가리키는 에러 문구.
fn is_not_found_description(description: &str) -> bool {
    let lower = description.to_lowercase();
    ["delisted", "no data", "no ticker"]
        .iter()
        .any(|phrase| lower.contains(phrase))
}

fn parse_chart_result(symbol: &str, body: &str, status: u16) -> UpstreamResult<ChartResult> {
    // 릴레이 해제 후에도 HTML이면 차단 응답으로 분류
    if looks_like_html_document(body) {
        return Err(UpstreamError::Blocked {
            symbol: symbol.to_string(),
            message: "upstream returned an HTML document instead of chart data".to_string(),
        });
    }

    let envelope: ChartEnvelope = deserialize_leading_json(body).map_err(|e| {
        if (200..300).contains(&status) {
            UpstreamError::Malformed {
                symbol: symbol.to_string(),
                message: format!("invalid chart payload: {e}"),
            }
        } else {
            UpstreamError::Blocked {
                symbol: symbol.to_string(),
                message: format!("upstream returned HTTP {status}"),
            }
        }
    })?;

    let chart = envelope.chart.ok_or_else(|| UpstreamError::Malformed {
        symbol: symbol.to_string(),
        message: "chart payload missing chart envelope".to_string(),
    })?;

    if let Some(error) = chart.error {
        let message = error
            .description
            .or(error.code)
            .unwrap_or_else(|| "upstream chart error".to_string());
        if is_not_found_description(&message) {
            return Err(UpstreamError::NotFound {
                symbol: symbol.to_string(),
                message,
            });
        }
        return Err(UpstreamError::Malformed {
            symbol: symbol.to_string(),
            message,
        });
    }

    chart
        .result
        .and_then(|mut results| {
            if results.is_empty() {
                None
            } else {
                Some(results.remove(0))
            }
        })
        .ok_or_else(|| UpstreamError::NotFound {
            symbol: symbol.to_string(),
            message: format!("no chart data returned for {symbol}"),
        })
}

/// timestamp/close/adjclose 배열을 인덱스로 결합하여 가격 포인트를 만듭니다.
///
/// timestamp나 close가 없거나 비정상(f64 non-finite)인 인덱스는 건너뛰고,
/// 같은 거래일이 중복되면 마지막 값이 남습니다.
fn extract_points(result: ChartResult) -> Vec<FetchedPricePoint> {
    let currency = result
        .meta
        .as_ref()
        .and_then(|meta| meta.currency.clone())
        .filter(|currency| !currency.is_empty())
        .unwrap_or_else(|| "N/A".to_string());

    let timestamps = result.timestamp.unwrap_or_default();
    let closes = result
        .indicators
        .as_ref()
        .and_then(|indicators| indicators.quote.as_ref())
        .and_then(|quotes| quotes.first())
        .and_then(|quote| quote.close.clone())
        .unwrap_or_default();
    let adjcloses = result
        .indicators
        .as_ref()
        .and_then(|indicators| indicators.adjclose.as_ref())
        .and_then(|series| series.first())
        .and_then(|series| series.adjclose.clone())
        .unwrap_or_default();

    let mut by_date: BTreeMap<NaiveDate, FetchedPricePoint> = BTreeMap::new();
    for (idx, timestamp) in timestamps.iter().enumerate() {
        let Some(timestamp) = timestamp else { continue };
        let Some(close) = closes.get(idx).copied().flatten().filter(|c| c.is_finite()) else {
            continue;
        };
        let adj_close = adjcloses
            .get(idx)
            .copied()
            .flatten()
            .filter(|c| c.is_finite())
            .unwrap_or(close);

        let Some(trade_date) = date_key_from_unix(*timestamp) else {
            continue;
        };
        let (Some(close), Some(adj_close)) = (
            Decimal::from_f64_retain(close),
            Decimal::from_f64_retain(adj_close),
        ) else {
            continue;
        };

        by_date.insert(
            trade_date,
            FetchedPricePoint {
                trade_date,
                close,
                adj_close,
                currency: currency.clone(),
            },
        );
    }

    by_date.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pricehub_core::parse_date_key;

    fn window(from: &str, to: &str) -> RefreshWindow {
        RefreshWindow {
            from_date: parse_date_key(from, "from").unwrap(),
            to_date: parse_date_key(to, "to").unwrap(),
        }
    }

    fn chart_payload(timestamps: &[i64], closes: &[f64]) -> String {
        let ts: Vec<String> = timestamps.iter().map(|t| t.to_string()).collect();
        let cl: Vec<String> = closes.iter().map(|c| c.to_string()).collect();
        format!(
            concat!(
                "{{\"chart\":{{\"result\":[{{",
                "\"meta\":{{\"symbol\":\"TEST\",\"currency\":\"USD\"}},",
                "\"timestamp\":[{}],",
                "\"indicators\":{{\"quote\":[{{\"close\":[{}]}}]}}",
                "}}],\"error\":null}}}}"
            ),
            ts.join(","),
            cl.join(","),
        )
    }

    #[tokio::test]
    async fn test_fetch_daily_history_parses_direct_response() {
        let mut server = mockito::Server::new_async().await;
        // 2024-01-02, 2024-01-03 (상하이 기준 낮 시간대)
        let body = chart_payload(&[1_704_164_400, 1_704_250_800], &[185.5, 186.25]);
        let mock = server
            .mock("GET", "/TSLA")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = ChartClient::with_endpoints(server.url(), "http://unused.invalid/");
        let points = client
            .fetch_daily_history("TSLA", &window("2024-01-01", "2024-01-05"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].trade_date, parse_date_key("2024-01-02", "d").unwrap());
        assert_eq!(points[0].currency, "USD");
        assert!(points[0].close > Decimal::ZERO);
        assert!(!client.prefers_relay());
    }

    #[tokio::test]
    async fn test_duplicate_dates_last_wins_and_sorted() {
        let mut server = mockito::Server::new_async().await;
        // 같은 상하이 거래일의 두 타임스탬프 + 하루 전 타임스탬프 (역순 입력)
        let body = chart_payload(
            &[1_704_250_800, 1_704_164_400, 1_704_168_000],
            &[200.0, 100.0, 150.0],
        );
        let _mock = server
            .mock("GET", "/TSLA")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = ChartClient::with_endpoints(server.url(), "http://unused.invalid/");
        let points = client
            .fetch_daily_history("TSLA", &window("2024-01-01", "2024-01-05"))
            .await
            .unwrap();

        // 거래일별 하나씩, 오름차순, 같은 날짜는 마지막 값이 남는다
        assert_eq!(points.len(), 2);
        assert!(points[0].trade_date < points[1].trade_date);
        assert_eq!(points[0].close, Decimal::from_f64_retain(150.0).unwrap());
        assert_eq!(points[1].close, Decimal::from_f64_retain(200.0).unwrap());
    }

    #[tokio::test]
    async fn test_missing_close_entries_are_skipped() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "{\"chart\":{\"result\":[{",
            "\"meta\":{\"currency\":\"USD\"},",
            "\"timestamp\":[1704164400,1704250800,null],",
            "\"indicators\":{\"quote\":[{\"close\":[185.5,null,190.0]}]}",
            "}],\"error\":null}}"
        );
        let _mock = server
            .mock("GET", "/TSLA")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = ChartClient::with_endpoints(server.url(), "http://unused.invalid/");
        let points = client
            .fetch_daily_history("TSLA", &window("2024-01-01", "2024-01-05"))
            .await
            .unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].adj_close, points[0].close);
    }

    #[tokio::test]
    async fn test_blocked_direct_retries_via_relay_once() {
        let mut server = mockito::Server::new_async().await;
        let direct = server
            .mock("GET", "/0700.HK")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("<!DOCTYPE html><html><body>blocked</body></html>")
            .expect(1)
            .create_async()
            .await;

        let payload = chart_payload(&[1_704_164_400], &[300.0]);
        let relay_body = format!(
            "Title: chart\n\nMarkdown Content:\n{payload}\n\ntrailing notes"
        );
        let relay = server
            .mock("GET", Matcher::Regex(r"^/relay/.+".to_string()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(relay_body)
            .expect(2)
            .create_async()
            .await;

        let client = ChartClient::with_endpoints(
            server.url(),
            format!("{}/relay/", server.url()),
        );

        // 첫 호출: 직접 403 → 릴레이 재시도 성공
        let points = client
            .fetch_daily_history("0700.HK", &window("2024-01-01", "2024-01-05"))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
        assert!(client.prefers_relay());

        // 두 번째 호출: 직접 시도 없이 곧바로 릴레이
        let points = client
            .fetch_daily_history("0700.HK", &window("2024-01-01", "2024-01-05"))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);

        direct.assert_async().await;
        relay.assert_async().await;

        client.reset_transport_preference();
        assert!(!client.prefers_relay());
    }

    #[tokio::test]
    async fn test_chart_error_with_delisted_phrase_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "{\"chart\":{\"result\":null,\"error\":{",
            "\"code\":\"Not Found\",",
            "\"description\":\"No data found, symbol may be delisted\"}}}"
        );
        let _mock = server
            .mock("GET", "/GONE")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(body)
            .create_async()
            .await;

        let client = ChartClient::with_endpoints(server.url(), "http://unused.invalid/");
        let err = client
            .fetch_daily_history("GONE", &window("2024-01-01", "2024-01-05"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.symbol(), "GONE");
    }

    #[tokio::test]
    async fn test_empty_result_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/EMPTY")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{\"chart\":{\"result\":[],\"error\":null}}")
            .create_async()
            .await;

        let client = ChartClient::with_endpoints(server.url(), "http://unused.invalid/");
        let err = client
            .fetch_daily_history("EMPTY", &window("2024-01-01", "2024-01-05"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/BAD")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not a json payload")
            .create_async()
            .await;

        let client = ChartClient::with_endpoints(server.url(), "http://unused.invalid/");
        let err = client
            .fetch_daily_history("BAD", &window("2024-01-01", "2024-01-05"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_quote_metadata() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "{\"chart\":{\"result\":[{",
            "\"meta\":{\"symbol\":\"0700.HK\",\"currency\":\"HKD\",",
            "\"longName\":\"Tencent Holdings Limited\",",
            "\"fullExchangeName\":\"HKSE\"}",
            "}],\"error\":null}}"
        );
        let mock = server
            .mock("GET", "/0700.HK")
            .match_query(Matcher::UrlEncoded("range".into(), "5d".into()))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = ChartClient::with_endpoints(server.url(), "http://unused.invalid/");
        let meta = client.fetch_quote_metadata("0700.HK").await.unwrap();

        mock.assert_async().await;
        assert_eq!(meta.name.as_deref(), Some("Tencent Holdings Limited"));
        // 거래소 키워드가 매칭되지 않으면 접미사 추론으로 대체
        assert_eq!(meta.region.as_deref(), Some("Hong Kong"));
        assert_eq!(meta.currency.as_deref(), Some("HKD"));
    }

    #[test]
    fn test_unwrap_relay_body() {
        let wrapped = "Title: x\nMarkdown Content:\nsome text {\"chart\":{}} tail";
        assert_eq!(unwrap_relay_body(wrapped), "{\"chart\":{}} tail");

        let bare = "prefix {\"chart\":{}}";
        assert_eq!(unwrap_relay_body(bare), "{\"chart\":{}}");
    }

    #[test]
    fn test_url_encode_symbol() {
        assert_eq!(url_encode_symbol("AAPL"), "AAPL");
        assert_eq!(url_encode_symbol("0700.HK"), "0700.HK");
        assert_eq!(url_encode_symbol("^GSPC"), "%5EGSPC");
        assert_eq!(url_encode_symbol("USDKRW=X"), "USDKRW%3DX");
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(
            strip_scheme("https://example.com/a?b=c"),
            "example.com/a?b=c"
        );
        assert_eq!(strip_scheme("example.com/a"), "example.com/a");
    }
}
