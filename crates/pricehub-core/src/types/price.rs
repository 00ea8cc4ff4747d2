//! 가격 데이터 도메인 타입.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::dates::date_key;

/// 업스트림에서 가져온 하루치 종가 데이터.
///
/// `adj_close`는 업스트림이 생략한 경우 `close`로 채워집니다.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPricePoint {
    pub trade_date: NaiveDate,
    pub close: Decimal,
    pub adj_close: Decimal,
    pub currency: String,
}

/// 심볼별 로컬 저장 범위 (가장 이른/늦은 거래일).
///
/// 저장소에 해당 심볼의 데이터가 전혀 없으면 존재하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeDateBounds {
    pub symbol: String,
    pub min_trade_date: NaiveDate,
    pub max_trade_date: NaiveDate,
}

/// API 응답용 하루치 가격 포인트.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPoint {
    /// 거래일 (YYYY-MM-DD)
    pub date: String,
    pub close: Decimal,
    pub adj_close: Decimal,
}

/// 한 심볼의 가격 시리즈.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolSeries {
    pub symbol: String,
    pub currency: String,
    pub points: Vec<HistoricalPoint>,
}

/// 심볼의 최신 종가 스냅샷.
#[derive(Debug, Clone)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub close: Decimal,
    pub currency: String,
}

impl HistoricalPoint {
    /// 저장소 레코드의 거래일을 날짜 키로 변환하여 생성합니다.
    pub fn new(trade_date: NaiveDate, close: Decimal, adj_close: Decimal) -> Self {
        Self {
            date: date_key(trade_date),
            close,
            adj_close,
        }
    }
}
