//! 활동 스트림 레코드.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::host::WinTab;

/// 활동 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEventType {
    Activated,
    Updated,
    Mutation,
}

/// 탭 활동 한 건. 저장 서버로만 전달하고 로컬에 남기지 않는다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub context_tab_pair: WinTab,
    pub previous_pair: Option<WinTab>,
    #[serde(rename = "type")]
    pub event_type: ActivityEventType,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    /// 페이지 스크립트 응답에서 병합된 필드
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActivityRecord {
    pub fn new(
        context_tab_pair: WinTab,
        previous_pair: Option<WinTab>,
        event_type: ActivityEventType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            context_tab_pair,
            previous_pair,
            event_type,
            url: String::new(),
            timestamp,
            extra: Map::new(),
        }
    }

    /// 응답 페이로드 병합 (기존 키는 덮어쓰지 않음)
    pub fn merge(&mut self, payload: &Map<String, Value>) {
        for (key, value) in payload {
            self.extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}
