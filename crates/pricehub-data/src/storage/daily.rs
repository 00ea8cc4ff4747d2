//! 일봉 가격 저장소.
//!
//! (symbol, trade_date)를 키로 하는 멱등 upsert와 시리즈/범위 조회를
//! 제공합니다. 마지막 쓰기가 우선합니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, info};

use pricehub_core::{
    FetchedPricePoint, HistoricalPoint, PriceSnapshot, SymbolSeries, TradeDateBounds,
};

use crate::error::{DataError, Result};
use crate::store::PriceStore;

/// 일봉 가격 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct DailyPriceRow {
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub close: Decimal,
    pub adj_close: Decimal,
    pub currency: String,
}

/// 일봉 가격 저장소.
#[derive(Clone)]
pub struct DailyPriceRepository {
    pool: PgPool,
}

impl DailyPriceRepository {
    /// 새 저장소를 생성합니다.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 일봉 가격을 upsert합니다 (마지막 쓰기 우선).
    pub async fn upsert_daily_prices(
        &self,
        symbol: &str,
        points: &[FetchedPricePoint],
    ) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let mut upserted = 0;

        // 청크 단위로 삽입 (성능 최적화)
        for chunk in points.chunks(500) {
            for point in chunk {
                let result = sqlx::query(
                    r#"
                    INSERT INTO daily_price
                        (symbol, trade_date, close, adj_close, currency, source, fetched_at)
                    VALUES ($1, $2, $3, $4, $5, 'yahoo', NOW())
                    ON CONFLICT (symbol, trade_date) DO UPDATE SET
                        close = EXCLUDED.close,
                        adj_close = EXCLUDED.adj_close,
                        currency = EXCLUDED.currency,
                        fetched_at = NOW()
                    "#,
                )
                .bind(symbol)
                .bind(point.trade_date)
                .bind(point.close)
                .bind(point.adj_close)
                .bind(&point.currency)
                .execute(&self.pool)
                .await
                .map_err(|e| DataError::InsertError(e.to_string()))?;

                upserted += result.rows_affected() as usize;
            }
        }

        info!(symbol = symbol, upserted = upserted, "일봉 가격 저장 완료");
        Ok(upserted)
    }

    /// 요청 범위의 가격 행을 조회합니다 (심볼/거래일 오름차순).
    pub async fn daily_price_rows(
        &self,
        symbols: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyPriceRow>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<DailyPriceRow> = sqlx::query_as(
            r#"
            SELECT symbol, trade_date, close, adj_close, currency
            FROM daily_price
            WHERE symbol = ANY($1) AND trade_date >= $2 AND trade_date <= $3
            ORDER BY symbol ASC, trade_date ASC
            "#,
        )
        .bind(symbols)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        debug!(
            symbols = symbols.len(),
            rows = rows.len(),
            "일봉 가격 행 조회"
        );

        Ok(rows)
    }

    /// 심볼별 가격 시리즈를 조회합니다.
    ///
    /// 결과는 입력 심볼 순서를 따르며, 데이터가 없는 심볼은 빠집니다.
    pub async fn price_series(
        &self,
        symbols: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SymbolSeries>> {
        let rows = self.daily_price_rows(symbols, from, to).await?;

        let mut grouped: HashMap<String, SymbolSeries> = HashMap::new();
        for row in rows {
            let series = grouped
                .entry(row.symbol.clone())
                .or_insert_with(|| SymbolSeries {
                    symbol: row.symbol.clone(),
                    currency: row.currency.clone(),
                    points: Vec::new(),
                });
            series
                .points
                .push(HistoricalPoint::new(row.trade_date, row.close, row.adj_close));
        }

        Ok(symbols
            .iter()
            .filter_map(|symbol| grouped.remove(symbol))
            .collect())
    }

    /// 심볼별 로컬 저장 범위(MIN/MAX 거래일)를 조회합니다.
    pub async fn trade_date_bounds(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, TradeDateBounds>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, Option<NaiveDate>, Option<NaiveDate>)> = sqlx::query_as(
            r#"
            SELECT symbol, MIN(trade_date), MAX(trade_date)
            FROM daily_price
            WHERE symbol = ANY($1)
            GROUP BY symbol
            "#,
        )
        .bind(symbols)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(symbol, min, max)| {
                let (min_trade_date, max_trade_date) = (min?, max?);
                Some((
                    symbol.clone(),
                    TradeDateBounds {
                        symbol,
                        min_trade_date,
                        max_trade_date,
                    },
                ))
            })
            .collect())
    }

    /// 심볼별 최신 종가 스냅샷을 조회합니다.
    pub async fn latest_snapshots(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, PriceSnapshot>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<DailyPriceRow> = sqlx::query_as(
            r#"
            SELECT DISTINCT ON (symbol)
                symbol, trade_date, close, adj_close, currency
            FROM daily_price
            WHERE symbol = ANY($1)
            ORDER BY symbol, trade_date DESC
            "#,
        )
        .bind(symbols)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.symbol.clone(),
                    PriceSnapshot {
                        symbol: row.symbol,
                        trade_date: row.trade_date,
                        close: row.close,
                        currency: row.currency,
                    },
                )
            })
            .collect())
    }

    /// 심볼의 마지막 저장 거래일을 조회합니다.
    pub async fn last_trade_date(&self, symbol: &str) -> Result<Option<NaiveDate>> {
        let row: Option<(NaiveDate,)> = sqlx::query_as(
            r#"
            SELECT trade_date FROM daily_price
            WHERE symbol = $1
            ORDER BY trade_date DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(row.map(|(trade_date,)| trade_date))
    }
}

#[async_trait]
impl PriceStore for DailyPriceRepository {
    async fn trade_date_bounds(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, TradeDateBounds>> {
        DailyPriceRepository::trade_date_bounds(self, symbols).await
    }

    async fn upsert_daily_prices(
        &self,
        symbol: &str,
        points: &[FetchedPricePoint],
    ) -> Result<usize> {
        DailyPriceRepository::upsert_daily_prices(self, symbol, points).await
    }
}
