//! 가격 저장소 경계 trait.
//!
//! 갱신 스케줄러와 하이드레이션은 저장소 구현이 아니라 이 trait에만
//! 의존합니다. 운영 환경에서는 PostgreSQL 저장소가, 테스트에서는
//! 인메모리 저장소가 이를 구현합니다.

use std::collections::HashMap;

use async_trait::async_trait;

use pricehub_core::{FetchedPricePoint, TradeDateBounds};

use crate::error::Result;

/// 갱신 경로가 소비하는 저장소 경계.
///
/// upsert는 (symbol, trade_date) 키 기준 멱등이며 마지막 쓰기가
/// 우선한다는 것 외의 트랜잭션 의미는 가정하지 않습니다.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// 심볼별 로컬 저장 범위를 조회합니다.
    ///
    /// 저장 데이터가 전혀 없는 심볼은 결과 맵에 포함되지 않습니다.
    async fn trade_date_bounds(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, TradeDateBounds>>;

    /// 일봉 가격을 upsert하고 반영된 행 수를 반환합니다.
    async fn upsert_daily_prices(
        &self,
        symbol: &str,
        points: &[FetchedPricePoint],
    ) -> Result<usize>;
}
