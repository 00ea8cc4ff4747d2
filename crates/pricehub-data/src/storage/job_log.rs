//! 일일 갱신 작업 로그 저장소.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use tracing::info;

use crate::error::{DataError, Result};

/// 일일 갱신 작업의 종료 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateJobStatus {
    /// 모든 심볼 성공
    Success,
    /// 일부 심볼 실패
    Partial,
    /// 모든 심볼 실패
    Failed,
}

impl UpdateJobStatus {
    /// 저장용 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateJobStatus::Success => "success",
            UpdateJobStatus::Partial => "partial",
            UpdateJobStatus::Failed => "failed",
        }
    }
}

/// 심볼 단위 갱신 실패.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFailure {
    pub symbol: String,
    pub error: String,
}

/// 일일 갱신 작업 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUpdateResult {
    /// 기준 시간대의 작업 날짜 (YYYY-MM-DD)
    pub job_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub status: UpdateJobStatus,
    pub total_symbols: usize,
    pub success_symbols: usize,
    pub failed_symbols: usize,
    pub upserted_rows: usize,
    pub message: String,
    pub failures: Vec<UpdateFailure>,
}

impl DailyUpdateResult {
    /// 결과 요약을 로그로 출력합니다.
    pub fn log_summary(&self) {
        info!(
            job_date = %self.job_date,
            status = self.status.as_str(),
            total = self.total_symbols,
            success = self.success_symbols,
            failed = self.failed_symbols,
            upserted = self.upserted_rows,
            message = %self.message,
            "일일 갱신 완료"
        );
    }
}

/// 갱신 작업 로그 저장소.
#[derive(Clone)]
pub struct UpdateJobLogRepository {
    pool: PgPool,
}

impl UpdateJobLogRepository {
    /// 새 저장소를 생성합니다.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 작업 결과를 기록합니다.
    pub async fn insert(&self, result: &DailyUpdateResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO update_job_log
                (job_date, started_at, ended_at, status,
                 total_symbols, success_symbols, failed_symbols, message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(result.job_date)
        .bind(result.started_at)
        .bind(result.ended_at)
        .bind(result.status.as_str())
        .bind(result.total_symbols as i32)
        .bind(result.success_symbols as i32)
        .bind(result.failed_symbols as i32)
        .bind(&result.message)
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::InsertError(e.to_string()))?;

        Ok(())
    }

    /// 마지막으로 성공한 갱신 시각을 조회합니다.
    pub async fn last_successful_update_at(&self) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT ended_at FROM update_job_log
            WHERE status = 'success'
            ORDER BY ended_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(row.map(|(ended_at,)| ended_at))
    }
}
