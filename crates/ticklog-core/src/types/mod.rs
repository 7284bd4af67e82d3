//! 시세 기록 전반에서 사용되는 공통 타입.

mod decimal;
mod instrument;

pub use decimal::*;
pub use instrument::*;
