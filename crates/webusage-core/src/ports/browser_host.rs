//! 브라우저 호스트 포트.
//!
//! 창/탭 조작, 탭 메시징, 방문 기록, 권한 확인, 호스트 이벤트 구독.
//! 구현: `webusage-network` crate (네이티브 메시징 브리지)

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::models::host::{
    DeletionRange, HistoryItem, HistoryQuery, HostEvent, TabHandle, TabId, WindowHandle, WindowId,
};
use crate::models::message::Message;

/// 브라우저 호스트 인터페이스
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// 새 창 생성 (`private`면 비공개 창)
    async fn create_window(&self, private: bool) -> Result<WindowHandle, CoreError>;

    /// 창 최소화
    async fn minimize_window(&self, window_id: WindowId) -> Result<(), CoreError>;

    /// 창 닫기 (소속 탭 포함)
    async fn remove_window(&self, window_id: WindowId) -> Result<(), CoreError>;

    /// 비활성 탭 생성
    async fn create_tab(&self, window_id: WindowId, url: &str) -> Result<TabHandle, CoreError>;

    /// 탭 이동
    async fn navigate_tab(&self, tab_id: TabId, url: &str) -> Result<(), CoreError>;

    /// 탭 조회
    async fn get_tab(&self, tab_id: TabId) -> Result<TabHandle, CoreError>;

    /// 탭 닫기
    async fn remove_tab(&self, tab_id: TabId) -> Result<(), CoreError>;

    /// 탭의 페이지 스크립트에 메시지 전달. 수신자가 응답하지 않으면 `None`.
    async fn send_tab_message(
        &self,
        tab_id: TabId,
        message: &Message,
    ) -> Result<Option<Value>, CoreError>;

    /// 방문 기록 검색
    async fn search_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryItem>, CoreError>;

    /// URL의 방문 상세
    async fn get_visits(&self, url: &str) -> Result<Vec<Value>, CoreError>;

    /// 범위 내 방문 기록 삭제
    async fn delete_history_range(&self, range: DeletionRange) -> Result<(), CoreError>;

    /// 비공개 창 생성 권한 여부
    async fn private_contexts_allowed(&self) -> Result<bool, CoreError>;

    /// 브라우저 쪽 shim 제거 요청
    async fn uninstall_self(&self) -> Result<(), CoreError>;

    /// 호스트 이벤트 구독
    fn subscribe(&self) -> broadcast::Receiver<HostEvent>;
}
