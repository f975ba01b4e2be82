//! 수집 시간 창.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 간격 계산 결과. 저장하지 않는다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// 지금 실행해도 되는지
    pub should_run: bool,
}

impl TimeWindow {
    /// 마이크로초 단위 경계 (웹사이트 기록 쿼리용)
    pub fn bounds_micros(&self) -> (i64, i64) {
        (self.start.timestamp_micros(), self.end.timestamp_micros())
    }
}
