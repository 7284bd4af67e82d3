//! 거래 세션 판정.
//!
//! 거래소 현지 시각 기준 평일 09:30:00 ~ 16:00:00 (양 끝 포함)을 장중으로 봅니다.
//! 서머타임 전환은 `chrono-tz` 시간대 규칙으로 처리합니다. 휴장일 달력은 없으며,
//! 휴장일의 조회 실패는 시세 조회 단계에서 종목 단위로 흡수됩니다.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::config::SessionConfig;

/// 정규장 시작 (현지 시각)
const OPEN_HMS: (u32, u32, u32) = (9, 30, 0);
/// 정규장 종료 (현지 시각)
const CLOSE_HMS: (u32, u32, u32) = (16, 0, 0);

/// 시간대 기반 세션 시계.
#[derive(Debug, Clone)]
pub struct SessionClock {
    timezone: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

impl SessionClock {
    /// 주어진 시간대의 정규장(09:30-16:00) 시계를 생성합니다.
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            open: hms(OPEN_HMS),
            close: hms(CLOSE_HMS),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.timezone)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// `now`가 거래 세션 안에 있는지 확인합니다.
    ///
    /// 토/일요일(월=0 기준 5 이상)은 항상 false입니다.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);

        if local.weekday().num_days_from_monday() >= 5 {
            return false;
        }

        let time = local.time();
        time >= self.open && time <= self.close
    }

    /// `now`를 거래소 현지 오프셋이 붙은 시각으로 변환합니다.
    ///
    /// 배치 타임스탬프와 원장 기록에 사용됩니다.
    pub fn local_time(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.timezone).fixed_offset()
    }
}

fn hms((h, m, s): (u32, u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN)
}
