//! 탭 활동 추적기.
//!
//! 탭 활성화/로드 이벤트를 활동 레코드로 만들어 저장 서버로 보낸다.
//! - 오케스트레이터가 만든 탭은 무시한다.
//! - 비공개 탭은 [`MessagingError::PrivateContext`]로 제외한다.
//! - 로드 완료 이벤트는 프로세스 전역 임계값 안에 다시 오면 중복으로 버린다.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use webusage_core::config::ActivityConfig;
use webusage_core::error::MessagingError;
use webusage_core::models::activity::{ActivityEventType, ActivityRecord};
use webusage_core::models::host::{HostEvent, TabHandle, TabId, TabStatus, WinTab, WindowId};
use webusage_core::models::job::{ApiKind, JobConfig};
use webusage_core::models::message::{Message, Subject};
use webusage_core::ports::browser_host::BrowserHost;

use crate::generated_tabs::GeneratedTabRegistry;
use crate::messaging::{FocusState, MessagingChannel};
use crate::routing::PayloadRouter;

/// 메시지 발신자 이름
const SENDER: &str = "activity";

/// 활동 추적기
pub struct ActivityTracker {
    host: Arc<dyn BrowserHost>,
    channel: Arc<MessagingChannel>,
    generated: Arc<GeneratedTabRegistry>,
    focus: Arc<FocusState>,
    router: Arc<PayloadRouter>,
    config: ActivityConfig,
    /// 마지막으로 기록된 로드 완료 시각
    last_loaded: Mutex<Option<DateTime<Utc>>>,
}

impl ActivityTracker {
    pub fn new(
        host: Arc<dyn BrowserHost>,
        channel: Arc<MessagingChannel>,
        generated: Arc<GeneratedTabRegistry>,
        focus: Arc<FocusState>,
        router: Arc<PayloadRouter>,
        config: ActivityConfig,
    ) -> Self {
        Self {
            host,
            channel,
            generated,
            focus,
            router,
            config,
            last_loaded: Mutex::new(None),
        }
    }

    /// 로드 완료 이벤트 선점
    ///
    /// 임계값 안이면 `Threshold`, 아니면 `now`를 기록하고 직전 값을 돌려준다.
    fn claim_loaded(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, MessagingError> {
        let mut last = self.last_loaded.lock();
        if let Some(prev) = *last {
            let elapsed_ms = (now - prev).num_milliseconds();
            if elapsed_ms < self.config.threshold_ms {
                return Err(MessagingError::Threshold {
                    elapsed_ms,
                    threshold_ms: self.config.threshold_ms,
                });
            }
        }
        Ok(last.replace(now))
    }

    /// 선점 취소 (확인 메시지 실패 시)
    fn release_loaded(&self, claimed: DateTime<Utc>, previous: Option<DateTime<Utc>>) {
        let mut last = self.last_loaded.lock();
        if *last == Some(claimed) {
            *last = previous;
        }
    }

    /// 탭 활성화 처리
    ///
    /// 페이지 스크립트가 응답하지 않아도 URL 없이 기록한다.
    pub async fn on_activated(
        &self,
        job: &JobConfig,
        tab_id: TabId,
        window_id: WindowId,
    ) -> Result<Option<ActivityRecord>, MessagingError> {
        if self.generated.contains(tab_id) {
            return Ok(None);
        }

        let wintab = WinTab::new(window_id, tab_id);
        let previous = self.focus.activate(wintab);
        let mut record =
            ActivityRecord::new(wintab, previous, ActivityEventType::Activated, Utc::now());

        let tab = self
            .host
            .get_tab(tab_id)
            .await
            .map_err(MessagingError::HostDelivery)?;
        if tab.private {
            return Err(MessagingError::PrivateContext);
        }

        match self
            .channel
            .send_standard(&tab, Message::to_content(SENDER, Subject::TabActivated), Duration::ZERO)
            .await
        {
            Ok(response) => record.url = response.url(),
            Err(MessagingError::PrivateContext) => return Err(MessagingError::PrivateContext),
            Err(e) => debug!("[{}] 활성화 응답 없음 (URL 없이 기록): {e}", job.job_id),
        }

        self.forward(job, &record).await;
        Ok(Some(record))
    }

    /// 탭 로드 상태 변경 처리
    pub async fn on_updated(
        &self,
        job: &JobConfig,
        tab: &TabHandle,
        status: TabStatus,
    ) -> Result<Option<ActivityRecord>, MessagingError> {
        if self.generated.contains(tab.id) {
            return Ok(None);
        }
        if tab.private {
            return Err(MessagingError::PrivateContext);
        }

        match status {
            TabStatus::Loading => {
                let response = self.channel.send_standard(tab, loading_message(), Duration::ZERO).await?;
                debug!("[{}] 로드 시작 확인: 탭 {} {}", job.job_id, tab.id, response.url());
                Ok(None)
            }
            TabStatus::Complete => self.on_loaded(job, tab).await,
        }
    }

    async fn on_loaded(
        &self,
        job: &JobConfig,
        tab: &TabHandle,
    ) -> Result<Option<ActivityRecord>, MessagingError> {
        let now = Utc::now();
        let previous_loaded = self.claim_loaded(now)?;

        let mut record = ActivityRecord::new(
            tab.wintab(),
            self.focus.active(),
            ActivityEventType::Updated,
            now,
        );

        // 확인 메시지가 실패하면 선점을 되돌린다
        let confirmed = match self.channel.send_standard(tab, loading_message(), Duration::ZERO).await {
            Ok(response) => response,
            Err(e) => {
                self.release_loaded(now, previous_loaded);
                return Err(e);
            }
        };
        record.url = confirmed.url();

        let params = serde_json::to_value(job)
            .map_err(|e| MessagingError::HostDelivery(e.into()))?;
        let loaded = Message::to_content(SENDER, Subject::TabLoaded).with_field("api_params", params);

        tokio::time::sleep(self.config.settle_delay()).await;
        // 생성 탭 등록이 로드 이벤트보다 늦게 도착할 수 있다
        if self.generated.contains(tab.id) {
            self.release_loaded(now, previous_loaded);
            return Ok(None);
        }

        // 확인 응답을 받은 뒤로 선점은 확정. `tab_loaded`가 실패해도 되돌리지 않는다.
        let response = self.channel.send_standard(tab, loaded, Duration::ZERO).await?;
        record.merge(&response.payload);

        self.forward(job, &record).await;
        Ok(Some(record))
    }

    /// 페이지 스크립트의 DOM 변경 보고 처리
    ///
    /// `{to: "activity", from: "content", subject: "tab_mutation", data}`만 받는다.
    pub async fn on_content_message(&self, job: &JobConfig, message: &Value) -> bool {
        let is_mutation = message.get("to").and_then(Value::as_str) == Some(SENDER)
            && message.get("from").and_then(Value::as_str) == Some("content")
            && message.get("subject").and_then(Value::as_str) == Some(Subject::TabMutation.as_str());
        if !is_mutation {
            return false;
        }

        let data = message.get("data").cloned().unwrap_or(Value::Null);
        if let Err(e) = self.router.save(&job.job_id, ApiKind::Activity, data).await {
            warn!("[{}] DOM 변경 저장 실패: {e}", job.job_id);
        }
        true
    }

    async fn forward(&self, job: &JobConfig, record: &ActivityRecord) {
        let payload = match serde_json::to_value(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[{}] 활동 레코드 직렬화 실패: {e}", job.job_id);
                return;
            }
        };
        if let Err(e) = self
            .router
            .route(job, ApiKind::Activity, &record.url, payload)
            .await
        {
            warn!("[{}] 활동 저장 실패: {e}", job.job_id);
        }
    }

    /// 호스트 이벤트 하나 처리 후 결과 로그
    pub async fn handle_event(&self, job: &JobConfig, event: HostEvent) {
        let result = match event {
            HostEvent::TabActivated { tab_id, window_id } => {
                self.on_activated(job, tab_id, window_id).await
            }
            HostEvent::TabUpdated { tab, status } => self.on_updated(job, &tab, status).await,
            HostEvent::ContentMessage { message, .. } => {
                self.on_content_message(job, &message).await;
                Ok(None)
            }
            HostEvent::HistoryVisited { .. } | HostEvent::TabRemoved { .. } => Ok(None),
        };

        match result {
            Ok(Some(record)) => debug!(
                "[{}] 활동 기록: {:?} {}",
                job.job_id, record.event_type, record.context_tab_pair
            ),
            Ok(None) => {}
            Err(e) if e.is_informational() => info!("[{}] {e}", job.job_id),
            Err(e @ MessagingError::HostDelivery(_)) => warn!("[{}] {e}", job.job_id),
            Err(e) => debug!("[{}] {e}", job.job_id),
        }
    }

    /// 이벤트 루프. 종료 신호까지 이벤트마다 태스크를 띄워 처리한다.
    pub async fn run(
        self: Arc<Self>,
        job: JobConfig,
        mut events: broadcast::Receiver<HostEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("[{}] 활동 추적 시작", job.job_id);
        let job = Arc::new(job);
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        let tracker = self.clone();
                        let job = job.clone();
                        tokio::spawn(async move { tracker.handle_event(&job, event).await });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("[{}] 호스트 이벤트 {skipped}개 누락", job.job_id);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("[{}] 활동 추적 종료", job.job_id);
    }
}

fn loading_message() -> Message {
    Message::to_content(SENDER, Subject::TabLoading).with_field("save_mutations", json!(true))
}
