//! Intraday quote collector CLI.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use ticklog_collector::{
    CollectorConfig, ContentStore, GitHubContentStore, LocalLedger, RemoteSyncer, Scheduler,
    SessionClock, SyncOutcome, YahooQuoteSource,
};
use ticklog_core::logging::{init_logging, LogConfig};

#[derive(Parser)]
#[command(name = "ticklog-collector")]
#[command(about = "Session-aware intraday quote collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 데몬 모드: 장중에는 짧게, 장 마감 중에는 길게 대기하며 반복 수집
    Run,

    /// 틱 한 번 실행 (조회 → 원장 기록 → 원격 게시)
    Once {
        /// 장 마감 중이어도 조회
        #[arg(long)]
        force: bool,
    },

    /// 현재 원장을 원격 저장소에 한 번 게시
    Publish,

    /// 세션 상태와 거래소 현지 시각 출력
    Status,
}

type CollectorScheduler = Scheduler<YahooQuoteSource, GitHubContentStore>;

fn build_scheduler(config: &CollectorConfig) -> anyhow::Result<CollectorScheduler> {
    let source = Arc::new(YahooQuoteSource::new()?);
    let ledger = LocalLedger::new(&config.ledger);

    let syncer = match &config.remote {
        Some(remote) => {
            let store = Arc::new(GitHubContentStore::new(remote)?);
            tracing::info!(target_object = %store.describe(), "원격 동기화 활성화");
            Some(
                RemoteSyncer::new(store, remote.max_attempts)
                    .with_retry_delay(remote.retry_delay()),
            )
        }
        None => {
            tracing::warn!("GITHUB_REPO가 없어 원격 동기화를 사용하지 않습니다");
            None
        }
    };

    Ok(Scheduler::new(config, source, ledger, syncer))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    let filter = format!(
        "ticklog_collector={lvl},ticklog_core={lvl}",
        lvl = cli.log_level
    );
    init_logging(LogConfig::new(filter).with_format_from_env())
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("Ticklog Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env().context("설정 로드 실패")?;
    tracing::debug!(
        instruments = config.instruments.len(),
        ledger = %config.ledger.path.display(),
        timezone = %config.session.timezone,
        "설정 로드 완료"
    );

    // 명령 실행
    match cli.command {
        Commands::Run => {
            let scheduler = build_scheduler(&config)?;
            scheduler.run().await?;
        }
        Commands::Once { force } => {
            let scheduler = build_scheduler(&config)?;
            scheduler.ledger().ensure_initialized().await?;

            let report = scheduler.tick(Utc::now(), force).await;
            if !report.sampled() {
                tracing::info!("장 마감 상태라 조회하지 않았습니다 (--force로 강제 실행)");
            } else {
                report.stats.log_summary("시세 수집");
            }
            if let Some(e) = report.ledger_error {
                return Err(e).context("원장 기록 실패");
            }
            if let SyncOutcome::Failed(e) = report.sync {
                return Err(e).context("원격 게시 실패");
            }
        }
        Commands::Publish => {
            let scheduler = build_scheduler(&config)?;
            scheduler.ledger().ensure_initialized().await?;

            match scheduler.publish().await? {
                Some(report) => tracing::info!(
                    attempts = report.attempts,
                    version = %report.version,
                    created = report.created,
                    "게시 완료"
                ),
                None => anyhow::bail!("원격 동기화가 설정되지 않았습니다 (GITHUB_REPO)"),
            }
        }
        Commands::Status => {
            let clock = SessionClock::from_config(&config.session);
            let now = Utc::now();
            let open = clock.is_open(now);

            println!("시간대: {}", clock.timezone());
            println!("현지 시각: {}", clock.local_time(now).format("%Y-%m-%d %H:%M:%S %:z"));
            println!("세션: {}", if open { "장중" } else { "장 마감" });
            println!(
                "다음 틱: {}초 후",
                if open {
                    config.schedule.open_interval_secs
                } else {
                    config.schedule.closed_interval_secs
                }
            );
            println!("원장: {}", config.ledger.path.display());
            match &config.remote {
                Some(remote) => println!("원격: {}", remote.describe()),
                None => println!("원격: 비활성화"),
            }
        }
    }

    tracing::info!("Ticklog Collector 종료");

    Ok(())
}
