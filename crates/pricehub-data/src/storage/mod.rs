//! PostgreSQL 저장소 모듈.

pub mod daily;
pub mod job_log;
pub mod watchlist;
