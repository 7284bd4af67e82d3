//! 로컬 원장 (append-only CSV).
//!
//! 원장 파일의 유일한 기록자입니다. 한 틱의 배치는 한 번의 쓰기로 연속해서 기록되고,
//! 디스크 동기화까지 끝난 뒤에 성공을 반환합니다. 기존 행은 수정하거나 삭제하지 않습니다.
//!
//! ## 파일 형식
//!
//! ```csv
//! Timestamp,Ticker,Price,Volume,Change %
//! 2024-06-03 10:15:00,AAPL,194.21,15320,0.87
//! ```

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use ticklog_core::{ledger_header, SampleBatch};

use crate::config::LedgerConfig;
use crate::error::LedgerError;

/// append-only 로컬 원장.
pub struct LocalLedger {
    path: PathBuf,
    /// 단일 기록자 보장 (쓰기와 전체 읽기를 직렬화)
    write_lock: Mutex<()>,
}

impl LocalLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        Self::at(config.path.clone())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 원장 파일을 준비합니다 (멱등).
    ///
    /// 상위 디렉터리와 파일이 없으면 만들고, 파일이 없거나 비어 있을 때만 헤더를 씁니다.
    /// 헤더를 새로 썼으면 `true`를 반환합니다.
    pub async fn ensure_initialized(&self) -> Result<bool, LedgerError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        let len = file.metadata().await.map_err(|e| self.io_error(e))?.len();
        if len > 0 {
            tracing::debug!(path = %self.path.display(), bytes = len, "기존 원장 사용");
            return Ok(false);
        }

        file.write_all(ledger_header().as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;
        file.sync_all().await.map_err(|e| self.io_error(e))?;

        tracing::info!(path = %self.path.display(), "원장 생성 (헤더 기록)");
        Ok(true)
    }

    /// 배치를 원장 끝에 추가합니다.
    ///
    /// 빈 배치는 기록하지 않고 0을 반환합니다. 그 외에는 기록한 행 수를 반환합니다.
    pub async fn append(&self, batch: &SampleBatch) -> Result<usize, LedgerError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let rows = batch.to_rows();
        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        file.write_all(rows.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;
        file.sync_data().await.map_err(|e| self.io_error(e))?;

        tracing::debug!(
            path = %self.path.display(),
            rows = batch.len(),
            bytes = rows.len(),
            "원장 기록 완료"
        );
        Ok(batch.len())
    }

    /// 원장 전체 내용을 읽습니다. 진행 중인 기록이 있으면 끝날 때까지 기다립니다.
    pub async fn read_all(&self) -> Result<Vec<u8>, LedgerError> {
        let _guard = self.write_lock.lock().await;
        fs::read(&self.path).await.map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};
    use ticklog_core::{Instrument, Quote, SessionBar};

    fn temp_ledger_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("ticklog-ledger-{}", uuid::Uuid::new_v4()))
            .join("data")
            .join("log.csv")
    }

    fn ts(minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 3, 10, minute, 0)
            .unwrap()
    }

    fn batch(minute: u32, entries: &[(&str, f64, f64, f64)]) -> SampleBatch {
        let mut batch = SampleBatch::new(ts(minute));
        for (name, open, close, volume) in entries {
            let bars = [SessionBar::new(Utc::now(), *open, *close, *volume)];
            let quote =
                Quote::from_session(Instrument::new(name).unwrap(), &bars, ts(minute)).unwrap();
            batch.push(quote);
        }
        batch
    }

    fn cleanup(path: &Path) {
        if let Some(root) = path.parent().and_then(|p| p.parent()) {
            let _ = std::fs::remove_dir_all(root);
        }
    }

    #[tokio::test]
    async fn test_initialize_writes_header_once() {
        let path = temp_ledger_path();
        let ledger = LocalLedger::at(&path);

        assert!(ledger.ensure_initialized().await.unwrap());
        assert!(!ledger.ensure_initialized().await.unwrap());

        let content = String::from_utf8(ledger.read_all().await.unwrap()).unwrap();
        assert_eq!(content, "Timestamp,Ticker,Price,Volume,Change %\n");

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_initialize_keeps_existing_content() {
        let path = temp_ledger_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "Timestamp,Ticker,Price,Volume,Change %\nold,row\n").unwrap();

        let ledger = LocalLedger::at(&path);
        assert!(!ledger.ensure_initialized().await.unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("old,row\n"));

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_append_preserves_history() {
        let path = temp_ledger_path();
        let ledger = LocalLedger::at(&path);
        ledger.ensure_initialized().await.unwrap();

        let first = batch(15, &[("AAA", 100.0, 110.0, 500.0), ("BBB", 50.0, 49.0, 7.0)]);
        assert_eq!(ledger.append(&first).await.unwrap(), 2);
        let before = ledger.read_all().await.unwrap();

        let second = batch(16, &[("AAA", 100.0, 111.0, 600.0)]);
        assert_eq!(ledger.append(&second).await.unwrap(), 1);
        let after = ledger.read_all().await.unwrap();

        assert_eq!(&after[..before.len()], &before[..]);
        let content = String::from_utf8(after).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Timestamp,Ticker,Price,Volume,Change %",
                "2024-06-03 10:15:00,AAA,110.00,500,10.00",
                "2024-06-03 10:15:00,BBB,49.00,7,-2.00",
                "2024-06-03 10:16:00,AAA,111.00,600,11.00",
            ]
        );

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_empty_batch_not_written() {
        let path = temp_ledger_path();
        let ledger = LocalLedger::at(&path);
        ledger.ensure_initialized().await.unwrap();

        let before = ledger.read_all().await.unwrap();
        assert_eq!(ledger.append(&SampleBatch::new(ts(0))).await.unwrap(), 0);
        assert_eq!(ledger.read_all().await.unwrap(), before);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_append_without_file_fails() {
        let path = temp_ledger_path();
        let ledger = LocalLedger::at(&path);

        let err = ledger
            .append(&batch(15, &[("AAA", 100.0, 110.0, 500.0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Io { .. }));
    }
}
