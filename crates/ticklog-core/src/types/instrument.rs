//! 수집 대상 종목 식별자.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// 거래소 티커 심볼 (예: "AAPL", "BRK-B").
///
/// 프로세스 시작 시 설정에서 한 번 만들어지며 이후 변경되지 않습니다.
/// 원장 행에 그대로 기록되므로 구분자(`,`)나 공백을 포함할 수 없습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Instrument(String);

impl Instrument {
    /// 식별자를 검증하여 생성합니다. 앞뒤 공백은 제거됩니다.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty()
            || trimmed
                .chars()
                .any(|c| c == ',' || c == '"' || c.is_whitespace() || c.is_control())
        {
            return Err(DomainError::InvalidInstrument(raw.as_ref().to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// 쉼표로 구분된 목록을 파싱합니다. 빈 항목은 건너뜁니다.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, DomainError> {
        raw.split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Self::new)
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Instrument {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Instrument {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Instrument> for String {
    fn from(value: Instrument) -> Self {
        value.0
    }
}

impl AsRef<str> for Instrument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_trims() {
        let inst = Instrument::new("  AAPL ").unwrap();
        assert_eq!(inst.as_str(), "AAPL");
        assert_eq!(inst.to_string(), "AAPL");
    }

    #[test]
    fn test_instrument_rejects_separators() {
        assert!(Instrument::new("").is_err());
        assert!(Instrument::new("AA,PL").is_err());
        assert!(Instrument::new("AA PL").is_err());
        assert!(Instrument::new("BRK-B").is_ok());
    }

    #[test]
    fn test_parse_list() {
        let list = Instrument::parse_list("AAPL, MSFT,,TSLA ").unwrap();
        let names: Vec<&str> = list.iter().map(|i| i.as_str()).collect();
        assert_eq!(names, vec!["AAPL", "MSFT", "TSLA"]);
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let inst: Instrument = serde_json::from_str("\"MSFT\"").unwrap();
        assert_eq!(inst.as_str(), "MSFT");
        assert!(serde_json::from_str::<Instrument>("\"A B\"").is_err());
    }
}
