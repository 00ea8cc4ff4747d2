//! 심볼별 백그라운드 꼬리 갱신 스케줄러.
//!
//! 읽기 요청을 막지 않으면서 로컬 저장소의 꼬리(마지막 저장 거래일
//! 이후)를 기회적으로 채웁니다.
//!
//! # 상태 전이 (심볼 단위)
//!
//! ```text
//! Idle ──[쿨다운 통과]──> Scheduled ──[누락 구간 있음]──> InFlight
//!   ↑                        │ 누락 구간 없음                │
//!   └────────────────────────┴──────[작업 완료/실패]─────────┘
//! ```
//!
//! - 같은 심볼은 동시에 하나의 갱신만 실행됩니다 (in-flight 중복 제거).
//! - 한 번 트리거된 심볼은 쿨다운(10분)이 지나야 다시 트리거됩니다.
//! - 실패는 진단 로그로만 남고 호출자에게 전파되지 않습니다.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use pricehub_core::{date_key, DateRange};
use pricehub_upstream::SymbolResolver;

use crate::refresh::gaps::missing_tail_window;
use crate::store::PriceStore;

/// 심볼 재갱신까지의 최소 대기 시간.
pub const REFRESH_COOLDOWN: Duration = Duration::from_secs(10 * 60);

/// 갱신을 트리거한 읽기 경로 (진단 로그 태그).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSource {
    /// 매트릭스 뷰 조회
    Matrix,
    /// 가격 시리즈 조회
    Query,
}

impl RefreshSource {
    fn as_str(&self) -> &'static str {
        match self {
            RefreshSource::Matrix => "matrix",
            RefreshSource::Query => "query",
        }
    }
}

/// 쿨다운/in-flight 상태 (mutex 보호, 짧은 임계 구역만 사용).
#[derive(Default)]
struct SchedulerState {
    in_flight: HashSet<String>,
    last_triggered: HashMap<String, Instant>,
}

struct SchedulerInner {
    store: Arc<dyn PriceStore>,
    resolver: Arc<SymbolResolver>,
    cooldown: Duration,
    state: Mutex<SchedulerState>,
    /// 테스트 drain용으로 추적하는 백그라운드 작업 핸들
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// 백그라운드 꼬리 갱신 스케줄러.
///
/// 프로세스당 하나를 생성해 공유합니다 (clone은 같은 인스턴스를
/// 가리킵니다). 쿨다운 타임스탬프와 in-flight 집합은 이 인스턴스만
/// 소유하고 변경합니다.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

impl RefreshScheduler {
    /// 기본 쿨다운으로 스케줄러를 생성합니다.
    pub fn new(store: Arc<dyn PriceStore>, resolver: Arc<SymbolResolver>) -> Self {
        Self::with_cooldown(store, resolver, REFRESH_COOLDOWN)
    }

    /// 쿨다운을 지정하여 생성합니다 (테스트용).
    pub fn with_cooldown(
        store: Arc<dyn PriceStore>,
        resolver: Arc<SymbolResolver>,
        cooldown: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                resolver,
                cooldown,
                state: Mutex::new(SchedulerState::default()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 여러 심볼의 꼬리 갱신을 검토합니다.
    ///
    /// 호출자를 막지 않으며 에러를 전파하지 않습니다.
    pub fn schedule_tail_refresh(&self, source: RefreshSource, symbols: &[String], range: DateRange) {
        for symbol in symbols {
            self.consider_refresh(source, symbol, range);
        }
    }

    /// 한 심볼의 꼬리 갱신을 검토합니다.
    ///
    /// 이미 실행 중이거나 쿨다운이 지나지 않았으면 아무것도 하지
    /// 않습니다. 그 외에는 누락 구간 계산과 조회를 백그라운드 작업으로
    /// 분리해 실행합니다. 이 호출 자체는 절대 막히지 않습니다.
    pub fn consider_refresh(&self, source: RefreshSource, symbol: &str, range: DateRange) {
        {
            let mut state = self.inner.lock_state();
            if state.in_flight.contains(symbol) {
                return;
            }
            if let Some(triggered_at) = state.last_triggered.get(symbol) {
                if triggered_at.elapsed() < self.inner.cooldown {
                    return;
                }
            }
            // Scheduled 상태 선점: 구간 계산이 끝나기 전의 중복 트리거 차단
            state.in_flight.insert(symbol.to_string());
        }

        let inner = Arc::clone(&self.inner);
        let symbol = symbol.to_string();
        let handle = tokio::spawn(async move {
            inner.run_refresh(source, symbol, range).await;
        });
        self.inner.lock_tasks().push(handle);
    }

    /// 해당 심볼의 갱신이 실행 중인지 확인합니다.
    pub fn is_in_flight(&self, symbol: &str) -> bool {
        self.inner.lock_state().in_flight.contains(symbol)
    }

    /// 추적 중인 모든 백그라운드 작업을 기다립니다 (테스트 전용).
    ///
    /// 운영 경로는 이 함수를 호출하지 않습니다.
    pub async fn drain_for_tests(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut tasks = self.inner.lock_tasks();
                std::mem::take(&mut *tasks)
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
    }

    /// 쿨다운/in-flight 상태를 초기화합니다 (테스트 격리용).
    pub fn reset_for_tests(&self) {
        let mut state = self.inner.lock_state();
        state.in_flight.clear();
        state.last_triggered.clear();
    }
}

impl SchedulerInner {
    /// 누락 구간 계산 → 해석 → 저장. 실패는 로그로만 남깁니다.
    async fn run_refresh(&self, source: RefreshSource, symbol: String, range: DateRange) {
        let bounds = match self.store.trade_date_bounds(std::slice::from_ref(&symbol)).await {
            Ok(mut bounds) => bounds.remove(&symbol),
            Err(error) => {
                warn!(
                    source = source.as_str(),
                    symbol = %symbol,
                    error = %error,
                    "갱신용 저장 범위 조회 실패"
                );
                self.clear_in_flight(&symbol);
                return;
            }
        };

        let Some(window) = missing_tail_window(range.from, range.to, bounds.as_ref()) else {
            // 로컬 데이터가 요청 끝을 이미 덮고 있음
            debug!(
                source = source.as_str(),
                symbol = %symbol,
                "누락 구간 없음, 갱신 생략"
            );
            self.clear_in_flight(&symbol);
            return;
        };

        // InFlight 전이: 쿨다운 시계는 실제 조회가 시작될 때만 기록
        self.lock_state()
            .last_triggered
            .insert(symbol.clone(), Instant::now());

        debug!(
            source = source.as_str(),
            symbol = %symbol,
            from = %date_key(window.from_date),
            to = %date_key(window.to_date),
            "꼬리 갱신 시작"
        );

        match self.resolver.resolve_daily_history(&symbol, &window).await {
            Ok(resolved) => {
                if resolved.points.is_empty() {
                    debug!(
                        source = source.as_str(),
                        symbol = %symbol,
                        "갱신 구간에 새 데이터 없음"
                    );
                } else {
                    match self
                        .store
                        .upsert_daily_prices(&symbol, &resolved.points)
                        .await
                    {
                        Ok(upserted) => {
                            debug!(
                                source = source.as_str(),
                                symbol = %symbol,
                                resolved = %resolved.resolved_symbol,
                                upserted = upserted,
                                "꼬리 갱신 완료"
                            );
                        }
                        Err(error) => {
                            warn!(
                                source = source.as_str(),
                                symbol = %symbol,
                                error = %error,
                                "갱신 데이터 저장 실패"
                            );
                        }
                    }
                }
            }
            Err(error) => {
                warn!(
                    source = source.as_str(),
                    symbol = %symbol,
                    error = %error,
                    "꼬리 갱신 실패"
                );
            }
        }

        self.clear_in_flight(&symbol);
    }

    fn clear_in_flight(&self, symbol: &str) {
        self.lock_state().in_flight.remove(symbol);
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().expect("refresh scheduler state lock poisoned")
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().expect("refresh scheduler task lock poisoned")
    }
}
