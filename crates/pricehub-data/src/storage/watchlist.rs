//! 워치리스트 저장소.
//!
//! 관리자가 등록한 관심 종목과 업스트림에서 자동 수집한 표시용
//! 메타데이터(이름/지역/통화)를 함께 보관합니다.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::info;

use pricehub_core::validate_symbol;
use pricehub_upstream::QuoteMetadata;

use crate::error::{DataError, Result};

/// 워치리스트 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct WatchSymbolRecord {
    pub symbol: String,
    /// 관리자가 지정한 표시 이름 (자동 수집 이름보다 우선)
    pub display_name: Option<String>,
    pub enabled: bool,
    /// 업스트림에서 자동 수집한 표시 이름
    pub auto_name: Option<String>,
    /// 업스트림에서 자동 수집한 지역
    pub auto_region: Option<String>,
    /// 업스트림에서 자동 수집한 통화
    pub auto_currency: Option<String>,
    /// 자동 메타데이터 마지막 갱신 시각
    pub meta_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// API 응답용 워치리스트 항목.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub symbol: String,
    pub display_name: Option<String>,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<WatchSymbolRecord> for WatchlistItem {
    fn from(record: WatchSymbolRecord) -> Self {
        Self {
            symbol: record.symbol,
            display_name: record.display_name,
            enabled: record.enabled,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// 워치리스트 저장소.
#[derive(Clone)]
pub struct WatchlistRepository {
    pool: PgPool,
}

impl WatchlistRepository {
    /// 새 저장소를 생성합니다.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 등록된 심볼 수.
    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM watch_symbol")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;
        Ok(row.0)
    }

    /// 워치리스트 레코드를 심볼 오름차순으로 조회합니다.
    pub async fn list_records(&self, enabled_only: bool) -> Result<Vec<WatchSymbolRecord>> {
        let query = if enabled_only {
            r#"
            SELECT symbol, display_name, enabled, auto_name, auto_region, auto_currency,
                   meta_updated_at, created_at, updated_at
            FROM watch_symbol
            WHERE enabled = true
            ORDER BY symbol ASC
            "#
        } else {
            r#"
            SELECT symbol, display_name, enabled, auto_name, auto_region, auto_currency,
                   meta_updated_at, created_at, updated_at
            FROM watch_symbol
            ORDER BY symbol ASC
            "#
        };

        sqlx::query_as(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))
    }

    /// 지정한 심볼들의 레코드를 맵으로 조회합니다.
    pub async fn records_by_symbols(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, WatchSymbolRecord>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let records: Vec<WatchSymbolRecord> = sqlx::query_as(
            r#"
            SELECT symbol, display_name, enabled, auto_name, auto_region, auto_currency,
                   meta_updated_at, created_at, updated_at
            FROM watch_symbol
            WHERE symbol = ANY($1)
            "#,
        )
        .bind(symbols)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(records
            .into_iter()
            .map(|record| (record.symbol.clone(), record))
            .collect())
    }

    /// 심볼을 추가하거나 다시 활성화합니다.
    pub async fn upsert_symbol(
        &self,
        symbol: &str,
        display_name: Option<&str>,
    ) -> Result<WatchSymbolRecord> {
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty());

        let record: WatchSymbolRecord = sqlx::query_as(
            r#"
            INSERT INTO watch_symbol (symbol, display_name, enabled, created_at, updated_at)
            VALUES ($1, $2, true, NOW(), NOW())
            ON CONFLICT (symbol) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                enabled = true,
                updated_at = NOW()
            RETURNING symbol, display_name, enabled, auto_name, auto_region, auto_currency,
                      meta_updated_at, created_at, updated_at
            "#,
        )
        .bind(symbol)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DataError::InsertError(e.to_string()))?;

        info!(symbol = symbol, "워치리스트 심볼 등록");
        Ok(record)
    }

    /// 심볼을 삭제합니다.
    pub async fn remove_symbol(&self, symbol: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM watch_symbol WHERE symbol = $1")
            .bind(symbol)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::DeleteError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!(
                "watch symbol not found: {symbol}"
            )));
        }

        info!(symbol = symbol, "워치리스트 심볼 삭제");
        Ok(())
    }

    /// 여러 심볼을 한 번에 등록합니다 (이미 있으면 다시 활성화).
    pub async fn bulk_insert(&self, symbols: &[String]) -> Result<()> {
        if symbols.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        for symbol in symbols {
            sqlx::query(
                r#"
                INSERT INTO watch_symbol (symbol, enabled, created_at, updated_at)
                VALUES ($1, true, NOW(), NOW())
                ON CONFLICT (symbol) DO UPDATE SET enabled = true, updated_at = NOW()
                "#,
            )
            .bind(symbol)
            .execute(&mut *tx)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(())
    }

    /// 자동 수집 메타데이터를 갱신합니다.
    pub async fn update_auto_meta(&self, symbol: &str, meta: &QuoteMetadata) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE watch_symbol
            SET auto_name = $2, auto_region = $3, auto_currency = $4,
                meta_updated_at = NOW(), updated_at = NOW()
            WHERE symbol = $1
            "#,
        )
        .bind(symbol)
        .bind(meta.name.as_deref())
        .bind(meta.region.as_deref())
        .bind(meta.currency.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(())
    }

    /// 워치리스트가 비어 있으면 기본 심볼을 시드합니다.
    ///
    /// 시드가 실제로 수행되었으면 true를 반환합니다.
    pub async fn bootstrap_defaults(&self, default_symbols: &[String]) -> Result<bool> {
        if self.count().await? > 0 {
            return Ok(false);
        }

        let mut validated: Vec<String> = Vec::with_capacity(default_symbols.len());
        for raw in default_symbols {
            let symbol = validate_symbol(raw)
                .map_err(|e| DataError::InvalidData(e.to_string()))?;
            if !validated.contains(&symbol) {
                validated.push(symbol);
            }
        }

        if validated.is_empty() {
            return Ok(false);
        }

        self.bulk_insert(&validated).await?;
        info!(count = validated.len(), "기본 워치리스트 시드 완료");
        Ok(true)
    }
}
