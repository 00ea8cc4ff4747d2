//! 환경변수 기반 설정 모듈.

use std::time::Duration;

use pricehub_core::config::{env_var_parse, AppEnv};

use crate::error::{Result, UpdaterError};

/// Updater 전체 설정.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 서비스 공통 환경 설정 (기본 워치리스트 등)
    pub app_env: AppEnv,
    /// 심볼 간 요청 딜레이 (밀리초)
    pub request_delay_ms: u64,
    /// 데몬 모드 실행 주기 (분)
    pub daemon_interval_minutes: u64,
}

impl UpdaterConfig {
    /// 환경변수에서 설정을 로드합니다.
    ///
    /// # 환경변수
    /// - `DATABASE_URL` (필수)
    /// - `UPDATE_REQUEST_DELAY_MS`: 심볼 간 딜레이 (기본: 200)
    /// - `UPDATE_DAEMON_INTERVAL_MINUTES`: 데몬 주기 (기본: 1440 = 하루)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            UpdaterError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;

        Ok(Self {
            database_url,
            app_env: AppEnv::from_env(),
            request_delay_ms: env_var_parse("UPDATE_REQUEST_DELAY_MS", 200),
            daemon_interval_minutes: env_var_parse("UPDATE_DAEMON_INTERVAL_MINUTES", 1440),
        })
    }

    /// 심볼 간 요청 딜레이를 Duration으로 반환.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// 데몬 실행 주기를 Duration으로 반환.
    pub fn daemon_interval(&self) -> Duration {
        Duration::from_secs(self.daemon_interval_minutes * 60)
    }
}
