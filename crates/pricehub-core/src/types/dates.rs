//! 거래일 및 날짜 범위 처리.
//!
//! 모든 거래일은 기준 시간대(Asia/Shanghai)의 달력 날짜로 해석됩니다.
//! 업스트림 타임스탬프(Unix 초)도 같은 시간대의 날짜 키로 변환하여
//! 저장소의 (symbol, trade_date) 키와 일치시킵니다.

use chrono::{Days, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{PricehubError, PricehubResult};

/// 거래일 해석에 사용하는 기준 시간대.
pub const REFERENCE_TIME_ZONE: Tz = chrono_tz::Asia::Shanghai;

/// 날짜 키 형식 (YYYY-MM-DD).
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// 기본 조회 범위 (to 기준 과거 1년).
const DEFAULT_LOOKBACK_MONTHS: u32 = 12;

/// 허용되는 최대 조회 범위 (20년).
const MAX_RANGE_MONTHS: u32 = 240;

/// 요청된 조회 범위 (양 끝 포함).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// 업스트림에 요청할 연속 구간 (양 끝 포함).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshWindow {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// YYYY-MM-DD 형식의 날짜 키를 파싱합니다.
pub fn parse_date_key(raw: &str, field_name: &str) -> PricehubResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_KEY_FORMAT)
        .map_err(|_| PricehubError::Input(format!("{field_name} must be in YYYY-MM-DD format")))
}

/// 날짜를 YYYY-MM-DD 키로 변환합니다.
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// 기준 시간대의 오늘 날짜.
pub fn reference_today() -> NaiveDate {
    Utc::now().with_timezone(&REFERENCE_TIME_ZONE).date_naive()
}

/// Unix 초 타임스탬프를 기준 시간대의 달력 날짜로 변환합니다.
pub fn date_key_from_unix(secs: i64) -> Option<NaiveDate> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.with_timezone(&REFERENCE_TIME_ZONE).date_naive())
}

/// 기준 시간대에서 해당 날짜가 시작되는 Unix 초.
pub fn day_start_unix(date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    REFERENCE_TIME_ZONE
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| midnight.and_utc().timestamp())
}

/// 기준 시간대에서 해당 날짜가 끝나는 Unix 초 (다음 날 자정 - 1초).
pub fn day_end_unix(date: NaiveDate) -> i64 {
    let next_day = date.checked_add_days(Days::new(1)).unwrap_or(date);
    day_start_unix(next_day) - 1
}

/// 선택적 from/to 문자열에서 조회 범위를 만듭니다.
///
/// 생략 시 to는 기준 시간대의 오늘, from은 to에서 1년 전으로 채워집니다.
/// `from > to` 또는 20년을 초과하는 범위는 입력 에러입니다.
pub fn build_date_range(
    from_raw: Option<&str>,
    to_raw: Option<&str>,
) -> PricehubResult<DateRange> {
    let default_to = reference_today();
    let to = match to_raw {
        Some(raw) => parse_date_key(raw, "to")?,
        None => default_to,
    };
    let from = match from_raw {
        Some(raw) => parse_date_key(raw, "from")?,
        None => to
            .checked_sub_months(Months::new(DEFAULT_LOOKBACK_MONTHS))
            .unwrap_or(to),
    };

    if from > to {
        return Err(PricehubError::Input(
            "from cannot be later than to".to_string(),
        ));
    }

    let max_from = to
        .checked_sub_months(Months::new(MAX_RANGE_MONTHS))
        .unwrap_or(to);
    if from < max_from {
        return Err(PricehubError::Input(
            "date range cannot exceed 20 years".to_string(),
        ));
    }

    Ok(DateRange { from, to })
}
