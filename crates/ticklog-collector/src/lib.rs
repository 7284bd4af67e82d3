//! Session-aware intraday quote collector.
//!
//! 이 crate는 장중 시세를 주기적으로 수집하는 바이너리를 제공합니다:
//! - 거래 세션 판정 (거래소 현지 시각, 서머타임 포함)
//! - 종목별 시세 조회 (Yahoo Finance 1분봉)
//! - append-only CSV 원장 기록
//! - GitHub contents API 낙관적 동시성 게시

pub mod config;
pub mod error;
pub mod github;
pub mod ledger;
pub mod quote_fetch;
pub mod remote_sync;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod yahoo;

pub use config::CollectorConfig;
pub use error::{CollectorError, FetchError, LedgerError, Result, StoreError, SyncError};
pub use github::GitHubContentStore;
pub use ledger::LocalLedger;
pub use quote_fetch::{FetchOutcome, QuoteFetcher, QuoteSource};
pub use remote_sync::{ContentStore, PublishReport, RemoteSnapshot, RemoteSyncer};
pub use scheduler::{Scheduler, SchedulerState, SyncOutcome, TickReport};
pub use session::SessionClock;
pub use stats::TickStats;
pub use yahoo::YahooQuoteSource;
