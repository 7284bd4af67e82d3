//! 도메인 에러 타입.
//!
//! 시세 정규화 과정에서 발생하는 에러를 정의합니다. 이 에러들은 모두
//! 종목 단위로 처리되며, 배치 전체를 중단시키지 않습니다.

use thiserror::Error;

/// 도메인 규칙 위반 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// 잘못된 종목 식별자
    #[error("잘못된 종목 식별자: {0:?}")]
    InvalidInstrument(String),

    /// 세션 데이터가 비어 있음 (장 시작 전 등)
    #[error("세션 데이터 없음")]
    EmptySession,

    /// 세션 시가가 0이라 등락률을 계산할 수 없음
    #[error("세션 시가가 0입니다")]
    ZeroOpenPrice,

    /// 숫자 값이 유효하지 않음 (NaN, 무한대, 음수 거래량)
    #[error("잘못된 숫자 값 ({field}): {value}")]
    InvalidNumber { field: &'static str, value: String },
}

/// 도메인 작업을 위한 Result 타입.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidNumber {
            field: "close",
            value: "NaN".to_string(),
        };
        assert_eq!(err.to_string(), "잘못된 숫자 값 (close): NaN");
        assert_eq!(DomainError::ZeroOpenPrice.to_string(), "세션 시가가 0입니다");
    }
}
