//! 환경변수 기반 설정 모듈.
//!
//! 설정은 프로세스 시작 시 한 번만 읽고, 이후에는 각 컴포넌트 생성자에
//! 참조로 전달됩니다. 컴포넌트는 환경변수를 직접 읽지 않습니다.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use secrecy::SecretString;
use ticklog_core::Instrument;

use crate::error::CollectorError;
use crate::Result;

/// 기본 수집 종목.
pub const DEFAULT_INSTRUMENTS: &str = "AAPL,MSFT,GOOGL,AMZN,TSLA";
/// 기본 원장 경로.
pub const DEFAULT_LEDGER_PATH: &str = "data/log.csv";
/// 기본 거래소 시간대.
pub const DEFAULT_TIMEZONE: &str = "America/New_York";
/// GitHub API 기본 주소.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
/// 기본 커밋 메시지.
pub const DEFAULT_COMMIT_MESSAGE: &str = "🔁 Automated log update";
/// 충돌 재시도 최소 횟수 (최초 시도 포함).
pub const MIN_SYNC_ATTEMPTS: u32 = 2;

/// Collector 전체 설정
#[derive(Debug)]
pub struct CollectorConfig {
    /// 수집 종목 (프로세스 수명 동안 고정)
    pub instruments: Vec<Instrument>,
    /// 로컬 원장 설정
    pub ledger: LedgerConfig,
    /// 거래 세션 설정
    pub session: SessionConfig,
    /// 스케줄 주기 설정
    pub schedule: ScheduleConfig,
    /// 시세 조회 설정
    pub fetch: FetchConfig,
    /// 원격 동기화 설정 (없으면 동기화 비활성화)
    pub remote: Option<RemoteConfig>,
}

/// 로컬 원장 설정
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// 원장 파일 경로
    pub path: PathBuf,
}

/// 거래 세션 설정
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 거래소 시간대
    pub timezone: Tz,
}

/// 스케줄 주기 설정
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// 장중 틱 간격 (초)
    pub open_interval_secs: u64,
    /// 장 마감 시 대기 간격 (초)
    pub closed_interval_secs: u64,
}

/// 시세 조회 설정
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// 동시 조회 종목 수
    pub concurrency: usize,
    /// 종목당 제한 시간 (초)
    pub timeout_secs: u64,
}

/// 원격 저장소(GitHub contents API) 설정
#[derive(Debug)]
pub struct RemoteConfig {
    /// API 기본 주소
    pub api_url: String,
    /// 저장소 (owner/name)
    pub repo: String,
    /// 저장소 내 파일 경로
    pub path: String,
    /// 대상 브랜치
    pub branch: String,
    /// Bearer 토큰
    pub token: SecretString,
    /// 커밋 작성자 이름
    pub username: Option<String>,
    /// 커밋 메시지
    pub commit_message: String,
    /// 충돌 시 최대 시도 횟수 (최초 시도 포함)
    pub max_attempts: u32,
    /// 충돌 재시도 기본 대기 (밀리초)
    pub retry_delay_ms: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드 (`.env` 파일 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 주어진 조회 함수에서 설정 로드
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let instruments_raw =
            lookup("TICKLOG_INSTRUMENTS").unwrap_or_else(|| DEFAULT_INSTRUMENTS.to_string());
        let instruments = Instrument::parse_list(&instruments_raw)
            .map_err(|e| CollectorError::Config(e.to_string()))?;
        if instruments.is_empty() {
            return Err(CollectorError::Config(
                "TICKLOG_INSTRUMENTS에 종목이 없습니다".to_string(),
            ));
        }

        let ledger_path =
            lookup("TICKLOG_LEDGER_PATH").unwrap_or_else(|| DEFAULT_LEDGER_PATH.to_string());

        let timezone_raw =
            lookup("TICKLOG_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_raw.parse().map_err(|e| {
            CollectorError::Config(format!("잘못된 시간대 {}: {}", timezone_raw, e))
        })?;

        let remote = match lookup("GITHUB_REPO").filter(|s| !s.trim().is_empty()) {
            Some(repo) => {
                let token = lookup("GITHUB_TOKEN")
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        CollectorError::Config(
                            "GITHUB_REPO가 설정되었지만 GITHUB_TOKEN이 없습니다".to_string(),
                        )
                    })?;
                Some(RemoteConfig {
                    api_url: lookup("GITHUB_API_URL")
                        .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
                    repo: repo.trim().to_string(),
                    path: lookup("GITHUB_PATH").unwrap_or_else(|| ledger_path.clone()),
                    branch: lookup("GITHUB_BRANCH").unwrap_or_else(|| "main".to_string()),
                    token: SecretString::from(token),
                    username: lookup("GITHUB_USERNAME").filter(|s| !s.is_empty()),
                    commit_message: lookup("TICKLOG_COMMIT_MESSAGE")
                        .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()),
                    max_attempts: parse_or(&lookup, "TICKLOG_SYNC_MAX_ATTEMPTS", 3u32)
                        .max(MIN_SYNC_ATTEMPTS),
                    retry_delay_ms: parse_or(&lookup, "TICKLOG_SYNC_RETRY_DELAY_MS", 500),
                })
            }
            None => None,
        };

        Ok(Self {
            instruments,
            ledger: LedgerConfig {
                path: PathBuf::from(ledger_path),
            },
            session: SessionConfig { timezone },
            schedule: ScheduleConfig {
                open_interval_secs: parse_or(&lookup, "TICKLOG_OPEN_INTERVAL_SECS", 60),
                closed_interval_secs: parse_or(&lookup, "TICKLOG_CLOSED_INTERVAL_SECS", 600),
            },
            fetch: FetchConfig {
                concurrency: parse_or(&lookup, "TICKLOG_FETCH_CONCURRENCY", 4usize).max(1),
                timeout_secs: parse_or(&lookup, "TICKLOG_FETCH_TIMEOUT_SECS", 15),
            },
            remote,
        })
    }
}

impl ScheduleConfig {
    /// 장중 틱 간격을 Duration으로 반환
    pub fn open_interval(&self) -> Duration {
        Duration::from_secs(self.open_interval_secs)
    }

    /// 장 마감 대기 간격을 Duration으로 반환
    pub fn closed_interval(&self) -> Duration {
        Duration::from_secs(self.closed_interval_secs)
    }
}

impl RemoteConfig {
    /// 로깅/상태 출력용 대상 설명 (예: "owner/repo:data/log.csv@main")
    pub fn describe(&self) -> String {
        format!(
            "{}:{}@{}",
            self.repo,
            self.path.trim_start_matches('/'),
            self.branch
        )
    }

    /// 충돌 재시도 기본 대기를 Duration으로 반환
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl FetchConfig {
    /// 종목당 제한 시간을 Duration으로 반환
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 값을 파싱 (없거나 실패 시 기본값 사용)
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
