//! 모든 핸들러에서 공유되는 애플리케이션 상태.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tokio::sync::OnceCell;

use pricehub_core::AppEnv;
use pricehub_data::{
    DailyPriceRepository, DataError, RefreshScheduler, UpdateJobLogRepository, WatchlistRepository,
};
use pricehub_upstream::{ChartClient, SymbolResolver};

/// 애플리케이션 공유 상태.
///
/// Arc로 래핑되어 Axum의 State extractor를 통해 핸들러에 주입됩니다.
pub struct AppState {
    /// 환경 설정
    pub env: AppEnv,

    /// 데이터베이스 연결 풀 (PostgreSQL)
    pub db_pool: PgPool,

    /// 일봉 가격 저장소
    pub prices: DailyPriceRepository,

    /// 워치리스트 저장소
    pub watchlist: WatchlistRepository,

    /// 갱신 작업 로그 저장소
    pub job_log: UpdateJobLogRepository,

    /// 업스트림 차트 클라이언트 (전송 선호 상태 소유)
    pub chart: Arc<ChartClient>,

    /// 심볼 후보 해석기
    pub resolver: Arc<SymbolResolver>,

    /// 백그라운드 꼬리 갱신 스케줄러 (프로세스당 하나)
    pub scheduler: RefreshScheduler,

    /// 기본 워치리스트 시드 1회 실행 게이트
    watchlist_seeded: OnceCell<()>,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState를 생성합니다.
    pub fn new(pool: PgPool, env: AppEnv) -> Self {
        let prices = DailyPriceRepository::new(pool.clone());
        let chart = Arc::new(ChartClient::new());
        let resolver = Arc::new(SymbolResolver::new(Arc::clone(&chart)));
        let scheduler = RefreshScheduler::new(Arc::new(prices.clone()), Arc::clone(&resolver));

        Self {
            env,
            prices,
            watchlist: WatchlistRepository::new(pool.clone()),
            job_log: UpdateJobLogRepository::new(pool.clone()),
            db_pool: pool,
            chart,
            resolver,
            scheduler,
            watchlist_seeded: OnceCell::new(),
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 워치리스트가 비어 있으면 기본 심볼을 시드합니다.
    ///
    /// 프로세스당 한 번만 수행되며, 실패하면 다음 호출에서 다시
    /// 시도합니다.
    pub async fn ensure_default_watchlist(&self) -> Result<(), DataError> {
        self.watchlist_seeded
            .get_or_try_init(|| async {
                self.watchlist
                    .bootstrap_defaults(&self.env.default_watchlist)
                    .await
                    .map(|_| ())
            })
            .await
            .map(|_| ())
    }
}
