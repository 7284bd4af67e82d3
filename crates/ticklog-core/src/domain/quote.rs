//! 시세 데이터 타입 및 구조체.
//!
//! 이 모듈은 수집 파이프라인이 주고받는 타입을 정의합니다:
//! - `SessionBar` - 시세 원천이 반환하는 당일 분봉
//! - `Quote` - 종목별로 정규화된 한 번의 샘플
//! - `SampleBatch` - 한 틱에서 만들어진 Quote 묶음

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::types::{decimal_from_f64, floor_volume, DecimalExt, Instrument, Percentage, Price};

/// 원장 헤더 컬럼.
pub const LEDGER_COLUMNS: [&str; 5] = ["Timestamp", "Ticker", "Price", "Volume", "Change %"];

/// 원장 타임스탬프 형식 (거래소 현지 시각).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 원장 헤더 행 (줄바꿈 포함).
pub fn ledger_header() -> String {
    let mut row = LEDGER_COLUMNS.join(",");
    row.push('\n');
    row
}

/// 당일 세션의 분봉 한 개.
///
/// 원천 데이터를 그대로 담으므로 값 검증은 `Quote::from_session`에서 합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBar {
    /// 분봉 시작 시각
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: f64,
    /// 종가
    pub close: f64,
    /// 거래량
    pub volume: f64,
}

impl SessionBar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            close,
            volume,
        }
    }
}

/// 한 번의 샘플링으로 얻은 종목 시세.
///
/// 생성 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// 샘플링 시각 (배치 공통, 거래소 현지 오프셋)
    pub timestamp: DateTime<FixedOffset>,
    /// 종목
    pub instrument: Instrument,
    /// 최근 체결가 (소수점 2자리)
    pub price: Price,
    /// 최근 분봉 거래량
    pub volume: u64,
    /// 세션 시가 대비 등락률 (%, 소수점 2자리)
    pub change_percent: Percentage,
}

impl Quote {
    /// 당일 분봉 목록에서 Quote를 만듭니다.
    ///
    /// - 세션 시가: 첫 분봉의 시가
    /// - 가격/거래량: 마지막 분봉의 종가/거래량
    ///
    /// # Errors
    ///
    /// - `DomainError::EmptySession`: 분봉이 하나도 없음
    /// - `DomainError::ZeroOpenPrice`: 세션 시가가 0
    /// - `DomainError::InvalidNumber`: NaN/무한대/음수 거래량
    pub fn from_session(
        instrument: Instrument,
        bars: &[SessionBar],
        timestamp: DateTime<FixedOffset>,
    ) -> DomainResult<Self> {
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(DomainError::EmptySession),
        };

        let session_open = decimal_from_f64("open", first.open)?;
        let close = decimal_from_f64("close", last.close)?;
        let volume = floor_volume(last.volume)?;

        if session_open.is_zero() {
            return Err(DomainError::ZeroOpenPrice);
        }

        let change = (close - session_open)
            .checked_div(session_open)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or(DomainError::ZeroOpenPrice)?;

        Ok(Self {
            timestamp,
            instrument,
            price: close.round_storage(),
            volume,
            change_percent: change.round_storage(),
        })
    }

    /// 원장 한 행으로 직렬화합니다 (줄바꿈 포함).
    pub fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{}\n",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.instrument,
            self.price.to_storage_string(),
            self.volume,
            self.change_percent.to_storage_string(),
        )
    }
}

/// 한 틱에서 수집된 Quote 묶음.
///
/// 모든 Quote는 배치의 타임스탬프를 공유합니다. 빈 배치는 유효하지만 커밋되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBatch {
    timestamp: DateTime<FixedOffset>,
    quotes: Vec<Quote>,
}

impl SampleBatch {
    pub fn new(timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            timestamp,
            quotes: Vec::new(),
        }
    }

    /// 배치 타임스탬프.
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// Quote를 추가합니다. 타임스탬프는 배치 값으로 맞춰집니다.
    pub fn push(&mut self, mut quote: Quote) {
        quote.timestamp = self.timestamp;
        self.quotes.push(quote);
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// 배치 전체를 원장 행들로 직렬화합니다.
    pub fn to_rows(&self) -> String {
        self.quotes.iter().map(Quote::to_row).collect()
    }
}
