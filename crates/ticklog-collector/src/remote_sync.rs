//! 원격 저장소 낙관적 동시성 동기화.
//!
//! # 알고리즘
//!
//! ```text
//! ┌────────────────────┐
//! │ 1. 현재 버전 조회   │◀──────────────┐
//! └─────────┬──────────┘               │ 충돌 (시도 < max_attempts)
//!           ▼                          │
//! ┌────────────────────┐               │
//! │ 2. 조건부 쓰기      │───────────────┘
//! │  (버전 토큰 첨부)   │
//! └─────────┬──────────┘
//!           ▼
//!     성공 / 전송 에러(즉시 반환) / 충돌 한도 초과
//! ```
//!
//! 전송 에러는 같은 틱 안에서 재시도하지 않습니다. 다음 틱이 그때의 원장 전체를
//! 다시 게시하며, 같은 내용은 같은 원격 상태로 수렴하므로 안전합니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::MIN_SYNC_ATTEMPTS;
use crate::error::{StoreError, SyncError};

/// 원격 객체의 현재 사본.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    /// 불투명 버전 토큰 (예: blob SHA)
    pub version: String,
    /// 객체 내용
    pub content: Vec<u8>,
}

/// 경로가 고정된 원격 내용 저장소 trait.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// 현재 사본 조회. 객체가 없으면 `None`.
    async fn read(&self) -> Result<Option<RemoteSnapshot>, StoreError>;

    /// 조건부 쓰기.
    ///
    /// `version`이 `None`이면 새 객체 생성, `Some`이면 해당 버전을 대체합니다.
    /// 버전이 오래되었으면 `StoreError::Conflict`를 반환합니다.
    /// 성공 시 새 버전 토큰을 반환합니다.
    async fn write(&self, content: &[u8], version: Option<&str>) -> Result<String, StoreError>;

    /// 로깅용 대상 설명 (예: "owner/repo:data/log.csv@main").
    fn describe(&self) -> String;
}

/// 게시 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// 사용한 시도 횟수 (1 = 충돌 없음)
    pub attempts: u32,
    /// 쓰기 후 원격 버전
    pub version: String,
    /// 새 객체를 만들었는지 여부
    pub created: bool,
}

/// 원장 내용을 원격 저장소에 게시합니다. 자체 상태는 없습니다.
pub struct RemoteSyncer<S: ?Sized> {
    store: Arc<S>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<S: ContentStore + ?Sized> RemoteSyncer<S> {
    /// `max_attempts`는 최초 시도를 포함하며 최소 2로 보정됩니다.
    pub fn new(store: Arc<S>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(MIN_SYNC_ATTEMPTS),
            retry_delay: Duration::ZERO,
        }
    }

    /// 충돌 재시도 전 대기 시간 (시도 횟수에 비례해 늘어남)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 내용을 게시합니다.
    ///
    /// # Errors
    ///
    /// - `SyncError::Conflict`: 재시도 한도까지 버전 충돌
    /// - `SyncError::Transport`: 네트워크/인증/응답 형식 에러 (재시도 없음)
    pub async fn publish(&self, content: &[u8]) -> Result<PublishReport, SyncError> {
        for attempt in 1..=self.max_attempts {
            let current = self.store.read().await.map_err(SyncError::Transport)?;
            let version = current.as_ref().map(|snapshot| snapshot.version.as_str());

            match self.store.write(content, version).await {
                Ok(new_version) => {
                    tracing::info!(
                        target_object = %self.store.describe(),
                        attempt,
                        bytes = content.len(),
                        version = %new_version,
                        "원격 게시 완료"
                    );
                    return Ok(PublishReport {
                        attempts: attempt,
                        version: new_version,
                        created: current.is_none(),
                    });
                }
                Err(StoreError::Conflict(message)) => {
                    tracing::warn!(
                        target_object = %self.store.describe(),
                        attempt,
                        max_attempts = self.max_attempts,
                        message = %message,
                        "원격 버전 충돌, 재조회 후 재시도"
                    );
                    if attempt < self.max_attempts && !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
                Err(e) => return Err(SyncError::Transport(e)),
            }
        }

        Err(SyncError::Conflict {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! 테스트용 메모리 저장소.

    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// 버전 카운터 기반 메모리 저장소.
    ///
    /// `interfere`로 지정한 횟수만큼 읽기와 쓰기 사이에 외부 갱신이 일어난 것처럼 동작합니다.
    #[derive(Default)]
    pub struct MemoryContentStore {
        state: Mutex<Option<RemoteSnapshot>>,
        next_version: AtomicU32,
        interfere: AtomicU32,
        fail_reads: AtomicU32,
        reads: AtomicU32,
        write_attempts: AtomicU32,
        writes: AtomicU32,
    }

    impl MemoryContentStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_content(content: &[u8]) -> Self {
            let store = Self::default();
            store.bump(content.to_vec());
            store
        }

        /// 다음 `n`번의 쓰기 직전에 외부 갱신을 끼워 넣습니다.
        pub fn interfere(&self, n: u32) {
            self.interfere.store(n, Ordering::SeqCst);
        }

        /// 다음 `n`번의 읽기를 전송 에러로 실패시킵니다.
        pub fn fail_reads(&self, n: u32) {
            self.fail_reads.store(n, Ordering::SeqCst);
        }

        pub fn snapshot(&self) -> Option<RemoteSnapshot> {
            self.state.lock().unwrap().clone()
        }

        pub fn reads(&self) -> u32 {
            self.reads.load(Ordering::SeqCst)
        }

        pub fn write_attempts(&self) -> u32 {
            self.write_attempts.load(Ordering::SeqCst)
        }

        pub fn writes(&self) -> u32 {
            self.writes.load(Ordering::SeqCst)
        }

        fn bump(&self, content: Vec<u8>) -> String {
            let version = format!("v{}", self.next_version.fetch_add(1, Ordering::SeqCst) + 1);
            *self.state.lock().unwrap() = Some(RemoteSnapshot {
                version: version.clone(),
                content,
            });
            version
        }

        fn take(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait]
    impl ContentStore for MemoryContentStore {
        async fn read(&self) -> Result<Option<RemoteSnapshot>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if Self::take(&self.fail_reads) {
                return Err(StoreError::Transport("HTTP 502".to_string()));
            }
            Ok(self.snapshot())
        }

        async fn write(
            &self,
            content: &[u8],
            version: Option<&str>,
        ) -> Result<String, StoreError> {
            self.write_attempts.fetch_add(1, Ordering::SeqCst);

            if Self::take(&self.interfere) {
                let external = self
                    .snapshot()
                    .map(|s| s.content)
                    .unwrap_or_default();
                self.bump([external, b"external\n".to_vec()].concat());
            }

            let current = self.snapshot().map(|s| s.version);
            if current.as_deref() != version {
                return Err(StoreError::Conflict(format!(
                    "expected {:?}, found {:?}",
                    version, current
                )));
            }

            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(self.bump(content.to_vec()))
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }
}
