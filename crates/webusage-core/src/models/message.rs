//! 오케스트레이터 ↔ 페이지 스크립트 메시지.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::host::WinTab;

/// 메시지 주제
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// 탭 활성화 알림
    TabActivated,
    /// 로드 시작 (DOM 변경 기록 여부 포함)
    TabLoading,
    /// 로드 완료, 페이로드 요청
    TabLoaded,
    /// 스냅샷 요청
    Snapshot,
    /// 페이지 스크립트 → 오케스트레이터 DOM 변경 보고
    TabMutation,
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TabActivated => "tab_activated",
            Self::TabLoading => "tab_loading",
            Self::TabLoaded => "tab_loaded",
            Self::Snapshot => "snapshot",
            Self::TabMutation => "tab_mutation",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 메시지에 첨부되는 탭 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabInfo {
    pub context_tab_pair: WinTab,
    #[serde(default)]
    pub previous_pair: Option<WinTab>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

/// 요청 메시지 `{to, from, subject, ...payload}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub to: String,
    pub from: String,
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_info: Option<TabInfo>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Message {
    /// `from` → 페이지 스크립트 메시지
    pub fn to_content(from: &str, subject: Subject) -> Self {
        Self {
            to: "content".to_string(),
            from: from.to_string(),
            subject,
            tab_info: None,
            payload: Map::new(),
        }
    }

    /// 페이로드 필드 추가
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }
}

/// 페이지 스크립트 응답 `{tab_info, ...payload}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentResponse {
    #[serde(default)]
    pub tab_info: Option<TabInfo>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ContentResponse {
    /// 응답에 담긴 URL (없으면 빈 문자열)
    pub fn url(&self) -> String {
        self.tab_info
            .as_ref()
            .and_then(|info| info.url.clone())
            .unwrap_or_default()
    }

    /// 비공개 컨텍스트에서 온 응답인지
    pub fn is_private(&self) -> bool {
        self.tab_info.as_ref().is_some_and(|info| info.is_private)
    }

    /// 문자열 필드 조회
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_flattens_payload() {
        let msg = Message::to_content("activity", Subject::TabLoading).with_field("save_mutations", json!(true));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["subject"], "tab_loading");
        assert_eq!(value["to"], "content");
        assert_eq!(value["from"], "activity");
        assert_eq!(value["save_mutations"], true);
        assert!(value.get("tab_info").is_none());
    }

    #[test]
    fn response_url_defaults_to_empty() {
        let resp: ContentResponse = serde_json::from_value(json!({"html": "<p>"})).unwrap();
        assert_eq!(resp.url(), "");
        assert!(!resp.is_private());
        assert_eq!(resp.str_field("html"), Some("<p>"));
    }

    #[test]
    fn response_reads_tab_info() {
        let resp: ContentResponse = serde_json::from_value(json!({
            "tab_info": {"context_tab_pair": "1-2", "url": "https://a.com", "is_private": true}
        }))
        .unwrap();
        assert_eq!(resp.url(), "https://a.com");
        assert!(resp.is_private());
    }
}
