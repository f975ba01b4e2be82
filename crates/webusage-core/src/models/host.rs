//! 브라우저 호스트 타입 (창, 탭, 방문 기록, 호스트 이벤트).

use serde::{Deserialize, Serialize};
use std::fmt;

/// 탭 ID
pub type TabId = i64;

/// 창 ID
pub type WindowId = i64;

/// (창, 탭) 쌍. 와이어에서는 `"창-탭"` 문자열로 표현한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WinTab {
    pub window_id: WindowId,
    pub tab_id: TabId,
}

impl WinTab {
    pub fn new(window_id: WindowId, tab_id: TabId) -> Self {
        Self { window_id, tab_id }
    }
}

impl fmt::Display for WinTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.window_id, self.tab_id)
    }
}

impl Serialize for WinTab {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WinTab {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let (win, tab) = raw
            .rsplit_once('-')
            .ok_or_else(|| serde::de::Error::custom(format!("잘못된 wintab: {raw}")))?;
        let window_id = win.parse().map_err(serde::de::Error::custom)?;
        let tab_id = tab.parse().map_err(serde::de::Error::custom)?;
        Ok(Self { window_id, tab_id })
    }
}

/// 탭 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabHandle {
    pub id: TabId,
    pub window_id: WindowId,
    #[serde(default)]
    pub url: String,
    /// 비공개(시크릿) 창 소속 여부
    #[serde(default)]
    pub private: bool,
}

impl TabHandle {
    pub fn wintab(&self) -> WinTab {
        WinTab::new(self.window_id, self.id)
    }
}

/// 창 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowHandle {
    pub id: WindowId,
    #[serde(default)]
    pub private: bool,
    /// 창 생성 시 함께 열린 탭
    #[serde(default)]
    pub root_tab: Option<TabId>,
}

/// 탭 로드 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// 방문 기록 검색 조건 (밀리초 epoch)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub text: String,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub max_results: u32,
}

/// 방문 기록 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    /// 마지막 방문 시각 (밀리초 epoch, 소수점 포함)
    #[serde(default)]
    pub last_visit_time_ms: Option<f64>,
    #[serde(default)]
    pub visit_count: Option<u32>,
}

/// 방문 기록 삭제 범위 (양 끝 포함, 밀리초 epoch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeletionRange {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl DeletionRange {
    /// 방문 시각 ±`margin_ms`
    pub fn around(visit_time_ms: f64, margin_ms: f64) -> Self {
        Self {
            start_ms: visit_time_ms - margin_ms,
            end_ms: visit_time_ms + margin_ms,
        }
    }

    pub fn contains(&self, time_ms: f64) -> bool {
        time_ms >= self.start_ms && time_ms <= self.end_ms
    }
}

/// 브라우저 호스트가 보내는 비동기 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// 탭 활성화
    TabActivated { tab_id: TabId, window_id: WindowId },
    /// 탭 로드 상태 변경
    TabUpdated { tab: TabHandle, status: TabStatus },
    /// 방문 기록 추가
    HistoryVisited { url: String, visit_time_ms: f64 },
    /// 페이지 스크립트가 먼저 보낸 메시지 (예: `tab_mutation`)
    ContentMessage {
        tab: TabHandle,
        message: serde_json::Value,
    },
    /// 탭 닫힘
    TabRemoved { tab_id: TabId },
}
