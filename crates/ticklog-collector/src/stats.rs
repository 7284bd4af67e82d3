//! 틱 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 한 틱의 처리 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickStats {
    /// 조회를 시도한 종목 수
    pub attempted: usize,
    /// 원장에 기록된 행 수
    pub committed: usize,
    /// 조회에 실패한 종목 수
    pub failed: usize,
    /// 원격 게시 시도 횟수 (게시하지 않았으면 0)
    pub sync_attempts: u32,
    /// 원격 게시 성공 여부
    pub synced: bool,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl TickStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 조회 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            (self.committed as f64 / self.attempted as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            attempted = self.attempted,
            committed = self.committed,
            failed = self.failed,
            sync_attempts = self.sync_attempts,
            synced = self.synced,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "틱 완료"
        );
    }
}
