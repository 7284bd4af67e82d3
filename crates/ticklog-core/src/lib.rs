//! # Ticklog Core
//!
//! 장중 시세 기록기의 핵심 도메인 타입을 제공합니다:
//! - 종목 식별자
//! - 분봉에서 정규화된 시세(Quote)와 틱 단위 배치
//! - 원장 행 형식
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
