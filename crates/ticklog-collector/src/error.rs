//! 에러 타입 정의.
//!
//! 어떤 에러도 프로세스를 종료시키지 않습니다. 종목 단위 에러는 배치에서
//! 제외되고, 원장/동기화 에러는 해당 틱에서만 보고된 뒤 다음 틱에 자연스럽게 재시도됩니다.

use std::path::PathBuf;

use thiserror::Error;
use ticklog_core::DomainError;

/// 종목 하나의 시세 조회 에러.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 시세 원천 호출 실패 (네트워크, API 에러)
    #[error("시세 조회 실패 ({instrument}): {message}")]
    Source { instrument: String, message: String },

    /// 시세 원천이 빈 결과를 반환 (장 시작 전 등)
    #[error("시세 데이터 없음: {0}")]
    NoData(String),

    /// 원천 데이터를 Quote로 정규화하지 못함 (시가 0, NaN 등)
    #[error("시세 정규화 실패 ({instrument}): {source}")]
    Domain {
        instrument: String,
        #[source]
        source: DomainError,
    },

    /// 제한 시간 초과
    #[error("시세 조회 타임아웃 ({instrument}, {timeout_secs}s)")]
    Timeout { instrument: String, timeout_secs: u64 },
}

/// 로컬 원장 I/O 에러.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("원장 I/O 실패 ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 원격 저장소 단일 요청 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 버전 토큰 불일치 (다른 쪽이 먼저 갱신함)
    #[error("버전 충돌: {0}")]
    Conflict(String),

    /// 인증/권한 실패
    #[error("인증 실패 (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// 네트워크 또는 예상하지 못한 HTTP 상태
    #[error("전송 실패: {0}")]
    Transport(String),

    /// 응답 본문 해석 실패
    #[error("잘못된 응답: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

/// 원격 동기화(publish) 에러.
#[derive(Debug, Error)]
pub enum SyncError {
    /// 재시도 한도까지 충돌이 계속됨
    #[error("재시도 {attempts}회 후에도 버전 충돌")]
    Conflict { attempts: u32 },

    /// 전송 계층 실패 (같은 틱 안에서는 재시도하지 않음)
    #[error("원격 저장소 전송 실패: {0}")]
    Transport(#[source] StoreError),
}

/// Collector 최상위 에러 타입.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 시세 원천 초기화 에러
    #[error("Data source error: {0}")]
    DataSource(String),

    /// 원장 에러
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// 동기화 에러
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
