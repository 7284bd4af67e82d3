//! 두 속도 폴링 스케줄러.
//!
//! # 상태 전이
//!
//! ```text
//!            장중                      기록 성공
//!   Idle ──────────▶ Sampling ──▶ Committing ──────────▶ Syncing ──▶ Idle
//!    │                               │ 기록 실패                      ▲
//!    │ 장 마감                        └───────────────────────────────┤
//!    └──────────▶ ClosedWait ─────────────────────────────────────────┘
//! ```
//!
//! 장중에는 짧은 간격, 장 마감 중에는 긴 간격으로 대기합니다.
//! 틱은 겹쳐 실행되지 않으며, 어떤 실패도 루프를 멈추지 않습니다.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ticklog_core::Instrument;
use tokio::time::Instant;

use crate::config::CollectorConfig;
use crate::error::{CollectorError, FetchError, LedgerError, SyncError};
use crate::ledger::LocalLedger;
use crate::quote_fetch::{QuoteFetcher, QuoteSource};
use crate::remote_sync::{ContentStore, PublishReport, RemoteSyncer};
use crate::session::SessionClock;
use crate::stats::TickStats;
use crate::Result;

/// 스케줄러 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// 틱 사이 대기
    Idle,
    /// 종목 시세 조회 중
    Sampling,
    /// 원장 기록 중
    Committing,
    /// 원격 게시 중
    Syncing,
    /// 장 마감 대기
    ClosedWait,
}

/// 한 틱의 원격 게시 결과.
#[derive(Debug)]
pub enum SyncOutcome {
    /// 원격 동기화가 설정되지 않음
    Disabled,
    /// 게시할 변경 없음 (빈 배치, 직전 게시 성공)
    Skipped,
    /// 원장 기록 실패로 게시하지 않음
    Abandoned,
    /// 게시 성공
    Published(PublishReport),
    /// 게시 실패 (다음 틱에 다시 게시)
    Failed(CollectorError),
}

/// 한 틱의 처리 결과.
#[derive(Debug)]
pub struct TickReport {
    /// 거쳐 간 상태 (Idle로 시작해 Idle로 끝남)
    pub states: Vec<SchedulerState>,
    /// 처리 통계
    pub stats: TickStats,
    /// 조회에 실패한 종목
    pub failures: Vec<(Instrument, FetchError)>,
    /// 원장 기록 에러
    pub ledger_error: Option<LedgerError>,
    /// 원격 게시 결과
    pub sync: SyncOutcome,
    /// 다음 틱까지 대기 시간
    pub next_delay: Duration,
}

impl TickReport {
    fn closed(delay: Duration) -> Self {
        Self {
            states: vec![SchedulerState::Idle, SchedulerState::ClosedWait],
            stats: TickStats::new(),
            failures: Vec::new(),
            ledger_error: None,
            sync: SyncOutcome::Skipped,
            next_delay: delay,
        }
    }

    /// 시세 조회를 수행한 틱인지 여부
    pub fn sampled(&self) -> bool {
        self.states.contains(&SchedulerState::Sampling)
    }
}

/// 세션 시계, 시세 조회, 원장, 원격 게시를 묶어 주기적으로 실행합니다.
pub struct Scheduler<Q: ?Sized, S: ?Sized> {
    clock: SessionClock,
    fetcher: QuoteFetcher<Q>,
    ledger: LocalLedger,
    syncer: Option<RemoteSyncer<S>>,
    instruments: Vec<Instrument>,
    open_interval: Duration,
    closed_interval: Duration,
    /// 원격이 로컬 원장보다 뒤처졌을 수 있음 (시작 직후, 기록 후, 게시 실패 후)
    sync_pending: AtomicBool,
}

impl<Q, S> Scheduler<Q, S>
where
    Q: QuoteSource + ?Sized,
    S: ContentStore + ?Sized,
{
    pub fn new(
        config: &CollectorConfig,
        source: Arc<Q>,
        ledger: LocalLedger,
        syncer: Option<RemoteSyncer<S>>,
    ) -> Self {
        Self {
            clock: SessionClock::from_config(&config.session),
            fetcher: QuoteFetcher::new(source, &config.fetch),
            ledger,
            syncer,
            instruments: config.instruments.clone(),
            open_interval: config.schedule.open_interval(),
            closed_interval: config.schedule.closed_interval(),
            sync_pending: AtomicBool::new(true),
        }
    }

    pub fn ledger(&self) -> &LocalLedger {
        &self.ledger
    }

    /// 틱 하나를 실행합니다.
    ///
    /// `force`가 true이면 세션 판정을 건너뛰고 바로 조회합니다.
    pub async fn tick(&self, now: DateTime<Utc>, force: bool) -> TickReport {
        if !force && !self.clock.is_open(now) {
            tracing::debug!(
                local_time = %self.clock.local_time(now),
                next_secs = self.closed_interval.as_secs(),
                "장 마감, 대기"
            );
            return TickReport::closed(self.closed_interval);
        }

        let started = Instant::now();
        let mut states = vec![SchedulerState::Idle, SchedulerState::Sampling];
        let mut stats = TickStats::new();

        let timestamp = self.clock.local_time(now);
        let outcome = self.fetcher.fetch_all(&self.instruments, timestamp).await;
        stats.attempted = outcome.attempted();
        stats.failed = outcome.failures.len();

        states.push(SchedulerState::Committing);
        let (ledger_error, sync) = match self.ledger.append(&outcome.batch).await {
            Ok(committed) => {
                stats.committed = committed;
                if committed > 0 {
                    self.sync_pending.store(true, Ordering::SeqCst);
                }
                let sync = self.sync_step(&mut states, &mut stats).await;
                (None, sync)
            }
            Err(e) => {
                tracing::error!(error = %e, "원장 기록 실패, 이번 틱의 게시 생략");
                (Some(e), SyncOutcome::Abandoned)
            }
        };

        states.push(SchedulerState::Idle);
        stats.elapsed = started.elapsed();

        TickReport {
            states,
            stats,
            failures: outcome.failures,
            ledger_error,
            sync,
            next_delay: self.open_interval,
        }
    }

    async fn sync_step(
        &self,
        states: &mut Vec<SchedulerState>,
        stats: &mut TickStats,
    ) -> SyncOutcome {
        let Some(syncer) = &self.syncer else {
            return SyncOutcome::Disabled;
        };
        if !self.sync_pending.load(Ordering::SeqCst) {
            return SyncOutcome::Skipped;
        }

        states.push(SchedulerState::Syncing);
        match self.publish_with(syncer).await {
            Ok(report) => {
                stats.sync_attempts = report.attempts;
                stats.synced = true;
                SyncOutcome::Published(report)
            }
            Err(e) => {
                stats.sync_attempts = match &e {
                    CollectorError::Sync(SyncError::Conflict { attempts }) => *attempts,
                    // 전송 에러는 같은 틱에서 재시도하지 않으므로 한 번 시도한 것
                    CollectorError::Sync(SyncError::Transport(_)) => 1,
                    // 원장을 읽지 못해 원격에는 접근하지 않음
                    _ => 0,
                };
                tracing::error!(error = %e, "원격 게시 실패, 다음 틱에 재시도");
                SyncOutcome::Failed(e)
            }
        }
    }

    /// 현재 원장 전체를 원격에 게시합니다.
    ///
    /// 원격 동기화가 설정되지 않았으면 `Ok(None)`을 반환합니다.
    pub async fn publish(&self) -> Result<Option<PublishReport>> {
        match &self.syncer {
            Some(syncer) => self.publish_with(syncer).await.map(Some),
            None => Ok(None),
        }
    }

    async fn publish_with(&self, syncer: &RemoteSyncer<S>) -> Result<PublishReport> {
        let content = self.ledger.read_all().await?;
        let report = syncer.publish(&content).await?;
        self.sync_pending.store(false, Ordering::SeqCst);
        Ok(report)
    }

    /// Ctrl-C 신호를 받을 때까지 스케줄러를 실행합니다.
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "종료 신호 대기 실패");
            }
        })
        .await
    }

    /// `shutdown`이 끝날 때까지 스케줄러를 실행합니다.
    ///
    /// 원장 초기화에 실패하면 루프를 시작하지 않고 에러를 반환합니다.
    /// 종료 신호는 틱 사이의 대기 중에만 확인합니다.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.ledger.ensure_initialized().await?;
        tracing::info!(
            instruments = self.instruments.len(),
            ledger = %self.ledger.path().display(),
            remote_sync = self.syncer.is_some(),
            open_secs = self.open_interval.as_secs(),
            closed_secs = self.closed_interval.as_secs(),
            "=== 스케줄러 시작 ==="
        );

        tokio::pin!(shutdown);
        loop {
            let report = self.tick(Utc::now(), false).await;
            if report.sampled() {
                report.stats.log_summary("시세 수집");
            }

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("종료 신호 수신, 스케줄러 종료 중...");
                    break;
                }
                _ = tokio::time::sleep(report.next_delay) => {}
            }
        }

        tracing::info!("=== 스케줄러 종료 ===");
        Ok(())
    }
}
