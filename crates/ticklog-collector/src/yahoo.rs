//! Yahoo Finance 시세 원천.
//!
//! 당일(`range=1d`) 1분봉(`interval=1m`)을 조회합니다.
//! 심볼은 Yahoo Finance 형식으로 전달되어야 합니다 (예: "AAPL", "005930.KS").

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use ticklog_core::{Instrument, SessionBar};
use yahoo_finance_api as yahoo;

use crate::error::{CollectorError, FetchError};
use crate::quote_fetch::QuoteSource;

/// 분봉 간격
const INTERVAL: &str = "1m";
/// 조회 기간 (당일 세션)
const RANGE: &str = "1d";

/// Yahoo Finance 기반 시세 원천.
pub struct YahooQuoteSource {
    connector: yahoo::YahooConnector,
}

impl YahooQuoteSource {
    pub fn new() -> Result<Self, CollectorError> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| CollectorError::DataSource(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self { connector })
    }

    /// 시각을 해석할 수 없는 분봉은 세션 판정이 불가능하므로 버립니다.
    fn to_session_bar(quote: &yahoo::Quote) -> Option<SessionBar> {
        let timestamp = Utc.timestamp_opt(quote.timestamp as i64, 0).single()?;
        Some(SessionBar::new(
            timestamp,
            quote.open,
            quote.close,
            quote.volume as f64,
        ))
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    async fn session_bars(&self, instrument: &Instrument) -> Result<Vec<SessionBar>, FetchError> {
        let response = self
            .connector
            .get_quote_range(instrument.as_str(), INTERVAL, RANGE)
            .await
            .map_err(|e| FetchError::Source {
                instrument: instrument.to_string(),
                message: format!("Yahoo Finance API 오류: {}", e),
            })?;

        // 장 시작 전에는 quotes()가 빈 데이터셋 에러를 낼 수 있으므로 빈 결과로 취급
        let quotes = match response.quotes() {
            Ok(quotes) => quotes,
            Err(e) => {
                tracing::debug!(instrument = %instrument, error = %e, "Yahoo Finance 분봉 없음");
                return Ok(Vec::new());
            }
        };

        let mut bars: Vec<SessionBar> = quotes.iter().filter_map(Self::to_session_bar).collect();
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn source_name(&self) -> &'static str {
        "yahoo"
    }
}
