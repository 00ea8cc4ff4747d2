//! 에러 타입 정의.

use std::fmt;

/// Updater 에러 타입.
#[derive(Debug)]
pub enum UpdaterError {
    /// 데이터베이스 에러
    Database(sqlx::Error),
    /// 설정 에러
    Config(String),
    /// 갱신 작업 에러
    Update(pricehub_data::DataError),
}

impl fmt::Display for UpdaterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Update(e) => write!(f, "Update error: {}", e),
        }
    }
}

impl std::error::Error for UpdaterError {}

impl From<sqlx::Error> for UpdaterError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl From<pricehub_data::DataError> for UpdaterError {
    fn from(err: pricehub_data::DataError) -> Self {
        Self::Update(err)
    }
}

/// Result 타입 별칭.
pub type Result<T> = std::result::Result<T, UpdaterError>;
