//! Standalone daily price updater CLI.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pricehub_data::{
    run_daily_update, DailyPriceRepository, DailyUpdateOptions, UpdateJobLogRepository,
    WatchlistRepository,
};
use pricehub_updater::UpdaterConfig;
use pricehub_upstream::{ChartClient, SymbolResolver};

#[derive(Parser)]
#[command(name = "pricehub-updater")]
#[command(about = "PriceHub Standalone Daily Updater", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 일일 갱신 1회 실행
    Run {
        /// 특정 심볼만 갱신 (쉼표로 구분, 예: "AAPL,0700.HK")
        #[arg(long)]
        symbols: Option<String>,
    },

    /// 데몬 모드: 주기적으로 일일 갱신 실행
    Daemon,
}

/// 쉼표 구분 심볼 필터를 파싱합니다.
fn parse_symbol_filter(raw: Option<String>) -> Option<Vec<String>> {
    raw.map(|value| {
        value
            .split(',')
            .map(|symbol| symbol.trim().to_uppercase())
            .filter(|symbol| !symbol.is_empty())
            .collect()
    })
}

async fn run_once(
    pool: &sqlx::PgPool,
    config: &UpdaterConfig,
    symbols: Option<Vec<String>>,
) -> pricehub_updater::Result<()> {
    let prices = DailyPriceRepository::new(pool.clone());
    let watchlist = WatchlistRepository::new(pool.clone());
    let job_log = UpdateJobLogRepository::new(pool.clone());
    let resolver = SymbolResolver::new(Arc::new(ChartClient::new()));

    let options = DailyUpdateOptions {
        default_watchlist: config.app_env.default_watchlist.clone(),
        symbols,
        request_delay: config.request_delay(),
    };

    run_daily_update(&prices, &watchlist, &job_log, &resolver, &options).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pricehub_updater={0},pricehub_data={0}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("PriceHub Daily Updater 시작");

    // 설정 로드
    let config = UpdaterConfig::from_env()?;

    // DB 연결
    let pool = sqlx::PgPool::connect(&config.database_url).await?;
    tracing::info!("데이터베이스 연결 성공");

    // 명령 실행
    match cli.command {
        Commands::Run { symbols } => {
            run_once(&pool, &config, parse_symbol_filter(symbols)).await?;
        }
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                config.daemon_interval_minutes
            );

            let mut interval = tokio::time::interval(config.daemon_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = run_once(&pool, &config, None).await {
                            tracing::error!("일일 갱신 실패: {}", e);
                        }
                    }
                }
            }
        }
    }

    pool.close().await;
    tracing::info!("PriceHub Daily Updater 종료");

    Ok(())
}
