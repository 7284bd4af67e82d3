//! 종목별 시세 조회 및 배치 구성.
//!
//! 시세 원천은 종목 단위로 불안정하므로 한 종목의 실패가 배치 전체를 멈추지 않습니다.
//! 실패한 종목은 로그를 남기고 배치에서 제외됩니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use futures::stream::{self, StreamExt};
use ticklog_core::{DomainError, Instrument, Quote, SampleBatch, SessionBar};

use crate::config::FetchConfig;
use crate::error::FetchError;

/// 시세 원천 trait.
///
/// 당일 세션의 1분봉을 시간순으로 반환합니다. 데이터가 없으면 빈 벡터를 반환합니다.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// 당일 세션 분봉 조회.
    ///
    /// # Errors
    ///
    /// - `FetchError::Source`: 네트워크/API 에러
    async fn session_bars(&self, instrument: &Instrument) -> Result<Vec<SessionBar>, FetchError>;

    /// 로깅용 원천 이름.
    fn source_name(&self) -> &'static str;
}

/// 한 틱의 조회 결과.
#[derive(Debug)]
pub struct FetchOutcome {
    /// 성공한 종목들의 배치
    pub batch: SampleBatch,
    /// 실패한 종목과 원인
    pub failures: Vec<(Instrument, FetchError)>,
}

impl FetchOutcome {
    /// 시도한 종목 수
    pub fn attempted(&self) -> usize {
        self.batch.len() + self.failures.len()
    }
}

/// 시세 원천을 감싸 종목별 조회를 정규화하고 실패를 격리합니다.
pub struct QuoteFetcher<S: ?Sized> {
    source: Arc<S>,
    concurrency: usize,
    timeout: Duration,
}

impl<S: QuoteSource + ?Sized> QuoteFetcher<S> {
    pub fn new(source: Arc<S>, config: &FetchConfig) -> Self {
        Self {
            source,
            concurrency: config.concurrency.max(1),
            timeout: config.timeout(),
        }
    }

    /// 종목 하나의 Quote 조회.
    ///
    /// `timestamp`와 같은 현지 날짜의 분봉만 사용합니다. 장 시작 직후 원천이 돌려주는
    /// 직전 거래일 분봉은 버립니다.
    /// 남은 분봉이 없으면 `FetchError::NoData`, 시가 0 등 정규화 실패는 `FetchError::Domain`입니다.
    pub async fn fetch(
        &self,
        instrument: &Instrument,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<Quote, FetchError> {
        let bars = tokio::time::timeout(self.timeout, self.source.session_bars(instrument))
            .await
            .map_err(|_| FetchError::Timeout {
                instrument: instrument.to_string(),
                timeout_secs: self.timeout.as_secs(),
            })??;

        let received = bars.len();
        let bars = current_session_bars(bars, timestamp);
        if bars.len() < received {
            tracing::debug!(
                instrument = %instrument,
                dropped = received - bars.len(),
                session_date = %timestamp.date_naive(),
                "이전 세션 분봉 제외"
            );
        }

        Quote::from_session(instrument.clone(), &bars, timestamp).map_err(|e| match e {
            DomainError::EmptySession => FetchError::NoData(instrument.to_string()),
            source => FetchError::Domain {
                instrument: instrument.to_string(),
                source,
            },
        })
    }

    /// 모든 종목을 조회하여 배치를 구성합니다.
    ///
    /// 최대 `concurrency`개를 동시에 조회하며, 모든 조회가 끝난 뒤에 반환합니다.
    /// 배치 순서는 설정된 종목 순서를 따릅니다.
    pub async fn fetch_all(
        &self,
        instruments: &[Instrument],
        timestamp: DateTime<FixedOffset>,
    ) -> FetchOutcome {
        let results: Vec<(Instrument, Result<Quote, FetchError>)> = stream::iter(instruments)
            .map(|instrument| async move {
                let result = self.fetch(instrument, timestamp).await;
                (instrument.clone(), result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut batch = SampleBatch::new(timestamp);
        let mut failures = Vec::new();

        for (instrument, result) in results {
            match result {
                Ok(quote) => {
                    tracing::debug!(
                        instrument = %instrument,
                        price = %quote.price,
                        volume = quote.volume,
                        change_percent = %quote.change_percent,
                        "시세 조회 완료"
                    );
                    batch.push(quote);
                }
                Err(e) => {
                    tracing::warn!(
                        instrument = %instrument,
                        source = self.source.source_name(),
                        error = %e,
                        "시세 조회 실패, 배치에서 제외"
                    );
                    failures.push((instrument, e));
                }
            }
        }

        FetchOutcome { batch, failures }
    }
}

/// 틱과 같은 현지 날짜의 분봉만 남깁니다.
fn current_session_bars(bars: Vec<SessionBar>, timestamp: DateTime<FixedOffset>) -> Vec<SessionBar> {
    let session_date = timestamp.date_naive();
    let offset = *timestamp.offset();
    bars.into_iter()
        .filter(|bar| bar.timestamp.with_timezone(&offset).date_naive() == session_date)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::StaticQuoteSource;
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn ts() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 3, 10, 0, 0)
            .unwrap()
    }

    fn instruments(names: &[&str]) -> Vec<Instrument> {
        names.iter().map(|n| Instrument::new(n).unwrap()).collect()
    }

    fn fetch_config() -> FetchConfig {
        FetchConfig {
            concurrency: 2,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_partial_failure_batching() {
        let source = StaticQuoteSource::new()
            .with_bar("AAA", 100.0, 110.0, 500.0)
            .with_bar("CCC", 50.0, 45.0, 10.0)
            .with_bar("EEE", 20.0, 20.0, 0.0)
            .with_bar("DDD", 0.0, 12.0, 5.0);
        let fetcher = QuoteFetcher::new(Arc::new(source), &fetch_config());

        let outcome = fetcher
            .fetch_all(&instruments(&["AAA", "BBB", "CCC", "DDD", "EEE"]), ts())
            .await;

        assert_eq!(outcome.attempted(), 5);
        assert_eq!(outcome.batch.len(), 3);
        let names: Vec<&str> = outcome
            .batch
            .quotes()
            .iter()
            .map(|q| q.instrument.as_str())
            .collect();
        assert_eq!(names, vec!["AAA", "CCC", "EEE"]);
        assert_eq!(outcome.batch.quotes()[1].change_percent, dec!(-10.00));

        let failed: Vec<&str> = outcome.failures.iter().map(|(i, _)| i.as_str()).collect();
        assert_eq!(failed, vec!["BBB", "DDD"]);
        assert!(matches!(outcome.failures[0].1, FetchError::Source { .. }));
        assert!(matches!(
            outcome.failures[1].1,
            FetchError::Domain {
                source: DomainError::ZeroOpenPrice,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_session_is_no_data() {
        let source = StaticQuoteSource::new().with_empty("AAA");
        let fetcher = QuoteFetcher::new(Arc::new(source), &fetch_config());

        let err = fetcher
            .fetch(&Instrument::new("AAA").unwrap(), ts())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoData(ref s) if s == "AAA"));
    }

    #[tokio::test]
    async fn test_previous_session_bars_are_no_data() {
        // 월요일 09:30 틱에 금요일 마지막 분봉만 돌아오는 경우
        let friday_close = Utc.with_ymd_and_hms(2024, 5, 31, 19, 59, 0).unwrap();
        let source = StaticQuoteSource::new()
            .with_bars("AAA", vec![SessionBar::new(friday_close, 100.0, 105.0, 10.0)]);
        let fetcher = QuoteFetcher::new(Arc::new(source), &fetch_config());
        let open_tick = FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 3, 9, 30, 0)
            .unwrap();

        let err = fetcher
            .fetch(&Instrument::new("AAA").unwrap(), open_tick)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoData(ref s) if s == "AAA"));
    }

    #[tokio::test]
    async fn test_session_open_ignores_previous_day_bars() {
        let bars = vec![
            SessionBar::new(Utc.with_ymd_and_hms(2024, 5, 31, 19, 59, 0).unwrap(), 90.0, 95.0, 7.0),
            SessionBar::new(Utc.with_ymd_and_hms(2024, 6, 3, 13, 30, 0).unwrap(), 100.0, 101.0, 3.0),
            SessionBar::new(Utc.with_ymd_and_hms(2024, 6, 3, 13, 59, 0).unwrap(), 102.0, 110.0, 500.0),
        ];
        let source = StaticQuoteSource::new().with_bars("AAA", bars);
        let fetcher = QuoteFetcher::new(Arc::new(source), &fetch_config());

        let quote = fetcher
            .fetch(&Instrument::new("AAA").unwrap(), ts())
            .await
            .unwrap();
        assert_eq!(quote.to_row(), "2024-06-03 10:00:00,AAA,110.00,500,10.00\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_instrument_times_out() {
        let source = StaticQuoteSource::new()
            .with_bar("AAA", 100.0, 101.0, 1.0)
            .with_stalled("BBB");
        let fetcher = QuoteFetcher::new(Arc::new(source), &fetch_config());

        let outcome = fetcher.fetch_all(&instruments(&["AAA", "BBB"]), ts()).await;

        assert_eq!(outcome.batch.len(), 1);
        assert!(matches!(
            outcome.failures[0].1,
            FetchError::Timeout { timeout_secs: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_batch_timestamp_shared() {
        let source = StaticQuoteSource::new()
            .with_bar("AAA", 1.0, 2.0, 1.0)
            .with_bar("BBB", 1.0, 3.0, 1.0);
        let fetcher = QuoteFetcher::new(Arc::new(source), &fetch_config());

        let outcome = fetcher.fetch_all(&instruments(&["AAA", "BBB"]), ts()).await;
        assert!(outcome.batch.quotes().iter().all(|q| q.timestamp == ts()));
        assert_eq!(outcome.batch.timestamp(), ts());
    }
}
