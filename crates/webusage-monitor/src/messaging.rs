//! 탭 메시징 채널.
//!
//! 페이지 스크립트에 `{to, from, subject, ...}` 메시지를 보내고 응답을 기다린다.
//! 송신 전 지연, 응답 타임아웃, 실패 분류([`MessagingError`])를 담당한다.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use webusage_core::error::{CoreError, MessagingError};
use webusage_core::models::host::{TabHandle, WinTab};
use webusage_core::models::message::{ContentResponse, Message, TabInfo};
use webusage_core::ports::browser_host::BrowserHost;

/// 사용자 포커스 상태 (현재 활성 탭)
#[derive(Debug, Default)]
pub struct FocusState {
    active: Mutex<Option<WinTab>>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성 탭 교체. 직전 활성 탭을 반환한다.
    pub fn activate(&self, wintab: WinTab) -> Option<WinTab> {
        self.active.lock().replace(wintab)
    }

    pub fn active(&self) -> Option<WinTab> {
        *self.active.lock()
    }
}

/// 탭 메시징 채널
pub struct MessagingChannel {
    host: Arc<dyn BrowserHost>,
    focus: Arc<FocusState>,
    response_timeout: Duration,
}

impl MessagingChannel {
    pub fn new(host: Arc<dyn BrowserHost>, focus: Arc<FocusState>, response_timeout: Duration) -> Self {
        Self {
            host,
            focus,
            response_timeout,
        }
    }

    /// `delay` 후 메시지 전송, 응답 대기
    ///
    /// 메시지에 `tab_info`(탭 쌍, 현재 활성 탭, 비공개 여부)를 붙인다.
    pub async fn send(
        &self,
        tab: &TabHandle,
        mut message: Message,
        delay: Duration,
    ) -> Result<ContentResponse, MessagingError> {
        message.tab_info = Some(TabInfo {
            context_tab_pair: tab.wintab(),
            previous_pair: self.focus.active(),
            url: None,
            is_private: tab.private,
        });

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let subject = message.subject;
        debug!("[{}] 메시지 전송 → 탭 {}: {subject}", message.from, tab.id);

        let reply = tokio::time::timeout(
            self.response_timeout,
            self.host.send_tab_message(tab.id, &message),
        )
        .await
        .map_err(|_| MessagingError::Timeout {
            timeout_ms: self.response_timeout.as_millis() as u64,
        })?
        .map_err(MessagingError::HostDelivery)?;

        let value = reply
            .filter(|v| !v.is_null())
            .ok_or_else(|| MessagingError::UndefinedResponse {
                subject: subject.to_string(),
            })?;

        serde_json::from_value(value)
            .map_err(|e| MessagingError::HostDelivery(CoreError::Serialization(e)))
    }

    /// 표준 컨텍스트 전용 전송
    ///
    /// 탭이나 응답이 비공개 컨텍스트면 [`MessagingError::PrivateContext`].
    pub async fn send_standard(
        &self,
        tab: &TabHandle,
        message: Message,
        delay: Duration,
    ) -> Result<ContentResponse, MessagingError> {
        if tab.private {
            return Err(MessagingError::PrivateContext);
        }
        let response = self.send(tab, message, delay).await?;
        if response.is_private() {
            return Err(MessagingError::PrivateContext);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use assert_matches::assert_matches;
    use serde_json::json;
    use webusage_core::models::message::Subject;

    async fn setup() -> (Arc<FakeHost>, MessagingChannel, TabHandle) {
        let host = Arc::new(FakeHost::new());
        let window = host.create_window(false).await.unwrap();
        let tab = host.create_tab(window.id, "https://a.com").await.unwrap();
        let channel = MessagingChannel::new(
            host.clone(),
            Arc::new(FocusState::new()),
            Duration::from_secs(5),
        );
        (host, channel, tab)
    }

    #[tokio::test]
    async fn attaches_tab_info() {
        let (host, channel, tab) = setup().await;
        let response = channel
            .send(&tab, Message::to_content("test", Subject::Snapshot), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(response.url(), "https://a.com");

        let sent = host.sent_messages();
        let info = sent[0].1.tab_info.as_ref().unwrap();
        assert_eq!(info.context_tab_pair, tab.wintab());
        assert!(!info.is_private);
    }

    #[tokio::test]
    async fn no_reply_is_undefined_response() {
        let (host, channel, tab) = setup().await;
        host.set_responder(|_, _| None);
        let err = channel
            .send(&tab, Message::to_content("test", Subject::TabLoading), Duration::ZERO)
            .await
            .unwrap_err();
        assert_matches!(err, MessagingError::UndefinedResponse { subject } if subject == "tab_loading");
    }

    #[tokio::test]
    async fn host_failure_is_delivery_error() {
        let (host, channel, tab) = setup().await;
        host.remove_tab(tab.id).await.unwrap();
        let err = channel
            .send(&tab, Message::to_content("test", Subject::Snapshot), Duration::ZERO)
            .await
            .unwrap_err();
        assert_matches!(err, MessagingError::HostDelivery(_));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reply_times_out() {
        let (host, _, tab) = setup().await;
        host.set_reply_delay(Duration::from_secs(60));
        let channel = MessagingChannel::new(
            host.clone(),
            Arc::new(FocusState::new()),
            Duration::from_secs(1),
        );
        let err = channel
            .send(&tab, Message::to_content("test", Subject::Snapshot), Duration::ZERO)
            .await
            .unwrap_err();
        assert_matches!(err, MessagingError::Timeout { timeout_ms: 1000 });
    }

    #[tokio::test]
    async fn private_tab_rejected_for_standard_stream() {
        let host = Arc::new(FakeHost::new());
        let window = host.create_window(true).await.unwrap();
        let tab = host.create_tab(window.id, "https://a.com").await.unwrap();
        let channel =
            MessagingChannel::new(host.clone(), Arc::new(FocusState::new()), Duration::from_secs(5));

        let err = channel
            .send_standard(&tab, Message::to_content("test", Subject::TabActivated), Duration::ZERO)
            .await
            .unwrap_err();
        assert_matches!(err, MessagingError::PrivateContext);
        assert!(host.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn private_reply_rejected_for_standard_stream() {
        let (host, channel, tab) = setup().await;
        host.set_responder(|_, _| {
            Some(json!({"tab_info": {"context_tab_pair": "1-2", "is_private": true}}))
        });
        let err = channel
            .send_standard(&tab, Message::to_content("test", Subject::TabActivated), Duration::ZERO)
            .await
            .unwrap_err();
        assert_matches!(err, MessagingError::PrivateContext);
    }

    #[test]
    fn focus_returns_previous() {
        let focus = FocusState::new();
        assert_eq!(focus.activate(WinTab::new(1, 1)), None);
        assert_eq!(focus.activate(WinTab::new(1, 2)), Some(WinTab::new(1, 1)));
        assert_eq!(focus.active(), Some(WinTab::new(1, 2)));
    }
}
