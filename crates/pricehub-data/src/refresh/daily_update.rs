//! 워치리스트 일일 갱신 작업.
//!
//! 활성 워치리스트의 각 심볼에 대해 마지막 저장 거래일 이후 구간을
//! 가져와 저장하고, 결과를 갱신 작업 로그에 기록합니다.
//! API의 내부 갱신 엔드포인트와 독립 실행 업데이터 바이너리가
//! 같은 경로를 사용합니다.

use std::future::Future;
use std::time::Duration;

use chrono::{Days, Months, Utc};
use tracing::{debug, error};

use pricehub_core::{reference_today, RefreshWindow};
use pricehub_upstream::SymbolResolver;

use crate::error::Result;
use crate::refresh::gaps::normalize_window_for_fetch;
use crate::storage::daily::DailyPriceRepository;
use crate::storage::job_log::{
    DailyUpdateResult, UpdateFailure, UpdateJobLogRepository, UpdateJobStatus,
};
use crate::storage::watchlist::WatchlistRepository;

/// 저장 데이터가 전혀 없는 심볼의 기본 수집 범위 (2년).
const DAILY_UPDATE_LOOKBACK_MONTHS: u32 = 24;

/// 심볼당 재시도 횟수.
const UPDATE_ATTEMPTS: u32 = 3;

/// 재시도 기본 대기 시간.
const UPDATE_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// 일일 갱신 실행 옵션.
#[derive(Debug, Clone)]
pub struct DailyUpdateOptions {
    /// 워치리스트가 비어 있을 때 시드할 기본 심볼
    pub default_watchlist: Vec<String>,
    /// 지정 시 이 심볼들만 갱신 (워치리스트 필터)
    pub symbols: Option<Vec<String>>,
    /// 심볼 간 요청 딜레이
    pub request_delay: Duration,
}

impl Default for DailyUpdateOptions {
    fn default() -> Self {
        Self {
            default_watchlist: Vec::new(),
            symbols: None,
            request_delay: Duration::from_millis(200),
        }
    }
}

/// 지수 백오프로 작업을 재시도합니다.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut task: F,
    attempts: u32,
    base_delay: Duration,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match task().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= attempts {
                    return Err(err);
                }
                let delay = base_delay * 2u32.saturating_pow(attempt - 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// 한 심볼의 꼬리 구간을 갱신하고 반영된 행 수를 반환합니다.
async fn update_single_symbol(
    prices: &DailyPriceRepository,
    resolver: &SymbolResolver,
    symbol: &str,
) -> Result<usize> {
    let today = reference_today();
    let from_date = match prices.last_trade_date(symbol).await? {
        Some(last) => match last.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => return Ok(0),
        },
        None => today
            .checked_sub_months(Months::new(DAILY_UPDATE_LOOKBACK_MONTHS))
            .unwrap_or(today),
    };

    if from_date > today {
        return Ok(0);
    }

    let window = normalize_window_for_fetch(RefreshWindow {
        from_date,
        to_date: today,
    });

    let resolved = resolver.resolve_daily_history(symbol, &window).await?;
    if resolved.points.is_empty() {
        return Ok(0);
    }

    prices.upsert_daily_prices(symbol, &resolved.points).await
}

fn classify_status(success_symbols: usize, failed_symbols: usize) -> UpdateJobStatus {
    if failed_symbols == 0 {
        UpdateJobStatus::Success
    } else if success_symbols == 0 {
        UpdateJobStatus::Failed
    } else {
        UpdateJobStatus::Partial
    }
}

fn summarize_message(total_symbols: usize, status: UpdateJobStatus, noop_symbols: usize) -> String {
    if total_symbols == 0 {
        return "watchlist-empty".to_string();
    }
    match status {
        UpdateJobStatus::Success if noop_symbols == total_symbols => "success(no-op)".to_string(),
        UpdateJobStatus::Success => "success".to_string(),
        UpdateJobStatus::Partial => "partial-success".to_string(),
        UpdateJobStatus::Failed => "all-failed".to_string(),
    }
}

/// 워치리스트 전체의 일일 갱신을 실행합니다.
///
/// 심볼 단위 실패는 결과에 집계될 뿐 작업 전체를 중단하지 않습니다.
pub async fn run_daily_update(
    prices: &DailyPriceRepository,
    watchlist: &WatchlistRepository,
    job_log: &UpdateJobLogRepository,
    resolver: &SymbolResolver,
    options: &DailyUpdateOptions,
) -> Result<DailyUpdateResult> {
    if !options.default_watchlist.is_empty() {
        watchlist.bootstrap_defaults(&options.default_watchlist).await?;
    }

    let started_at = Utc::now();
    let records = watchlist.list_records(true).await?;
    let targets: Vec<String> = match &options.symbols {
        Some(filter) => records
            .into_iter()
            .map(|record| record.symbol)
            .filter(|symbol| filter.contains(symbol))
            .collect(),
        None => records.into_iter().map(|record| record.symbol).collect(),
    };

    let mut success_symbols = 0;
    let mut failed_symbols = 0;
    let mut noop_symbols = 0;
    let mut upserted_rows = 0;
    let mut failures: Vec<UpdateFailure> = Vec::new();

    for (idx, symbol) in targets.iter().enumerate() {
        debug!(
            symbol = %symbol,
            progress = format!("{}/{}", idx + 1, targets.len()),
            "심볼 갱신 시작"
        );

        let outcome = retry_with_backoff(
            || update_single_symbol(prices, resolver, symbol),
            UPDATE_ATTEMPTS,
            UPDATE_RETRY_BASE_DELAY,
        )
        .await;

        match outcome {
            Ok(updated_rows) => {
                success_symbols += 1;
                upserted_rows += updated_rows;
                if updated_rows == 0 {
                    noop_symbols += 1;
                }
            }
            Err(err) => {
                failed_symbols += 1;
                error!(symbol = %symbol, error = %err, "심볼 갱신 실패");
                failures.push(UpdateFailure {
                    symbol: symbol.clone(),
                    error: err.to_string(),
                });
            }
        }

        if !options.request_delay.is_zero() {
            tokio::time::sleep(options.request_delay).await;
        }
    }

    let status = classify_status(success_symbols, failed_symbols);
    let result = DailyUpdateResult {
        job_date: reference_today(),
        started_at,
        ended_at: Utc::now(),
        status,
        total_symbols: targets.len(),
        success_symbols,
        failed_symbols,
        upserted_rows,
        message: summarize_message(targets.len(), status, noop_symbols),
        failures,
    };

    job_log.insert(&result).await?;
    result.log_summary();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(3, 0), UpdateJobStatus::Success);
        assert_eq!(classify_status(2, 1), UpdateJobStatus::Partial);
        assert_eq!(classify_status(0, 3), UpdateJobStatus::Failed);
        // 빈 워치리스트는 실패 없이 성공으로 분류된다
        assert_eq!(classify_status(0, 0), UpdateJobStatus::Success);
    }

    #[test]
    fn test_summarize_message() {
        assert_eq!(summarize_message(0, UpdateJobStatus::Success, 0), "watchlist-empty");
        assert_eq!(summarize_message(3, UpdateJobStatus::Success, 3), "success(no-op)");
        assert_eq!(summarize_message(3, UpdateJobStatus::Success, 1), "success");
        assert_eq!(summarize_message(3, UpdateJobStatus::Partial, 0), "partial-success");
        assert_eq!(summarize_message(3, UpdateJobStatus::Failed, 0), "all-failed");
    }

    #[tokio::test]
    async fn test_retry_with_backoff_recovers() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = retry_with_backoff(
            || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err(crate::error::DataError::FetchError("transient".to_string()))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_with_backoff_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(crate::error::DataError::FetchError("permanent".to_string())) }
            },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
