//! 시세 저장을 위한 Decimal 유틸리티.
//!
//! 원장에 기록되는 가격과 등락률은 모두 소수점 두 자리로 고정됩니다.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// 가격 타입.
pub type Price = Decimal;

/// 퍼센트 타입 (10.00 = 10%).
pub type Percentage = Decimal;

/// 원장 저장 시 소수점 자릿수.
pub const STORAGE_DP: u32 = 2;

/// 원장 저장 형식과 관련된 Decimal 확장 트레이트.
pub trait DecimalExt {
    /// 저장 자릿수(2)로 반올림합니다. 중간값은 0에서 먼 쪽으로 올립니다.
    fn round_storage(&self) -> Decimal;

    /// 저장 자릿수로 반올림한 뒤 항상 두 자리 소수로 출력합니다 (예: "110.00").
    fn to_storage_string(&self) -> String;
}

impl DecimalExt for Decimal {
    fn round_storage(&self) -> Decimal {
        self.round_dp_with_strategy(STORAGE_DP, RoundingStrategy::MidpointAwayFromZero)
    }

    fn to_storage_string(&self) -> String {
        format!("{:.2}", self.round_storage())
    }
}

/// 시세 원천의 `f64` 값을 Decimal로 변환합니다.
///
/// NaN, 무한대는 `DomainError::InvalidNumber`로 거부됩니다.
pub fn decimal_from_f64(field: &'static str, value: f64) -> DomainResult<Decimal> {
    if !value.is_finite() {
        return Err(DomainError::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
    Decimal::from_f64(value).ok_or_else(|| DomainError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// 거래량을 음이 아닌 정수로 내림합니다.
pub fn floor_volume(value: f64) -> DomainResult<u64> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::InvalidNumber {
            field: "volume",
            value: value.to_string(),
        });
    }
    Ok(value.floor() as u64)
}
