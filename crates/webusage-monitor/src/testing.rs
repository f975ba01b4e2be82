//! 인메모리 브라우저 호스트 (테스트용).
//!
//! 탭을 만들면 즉시 로드 완료 이벤트를 보내고, 표준 창이면 방문 기록을 남긴다.
//! 응답기, 응답 지연, 로드 지연 URL을 바꿔 실패 경로를 재현할 수 있다.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use webusage_core::error::CoreError;
use webusage_core::models::host::{
    DeletionRange, HistoryItem, HistoryQuery, HostEvent, TabHandle, TabId, TabStatus,
    WindowHandle, WindowId,
};
use webusage_core::models::job::ApiKind;
use webusage_core::models::message::Message;
use webusage_core::ports::browser_host::BrowserHost;
use webusage_core::ports::notifier::Notifier;
use webusage_core::ports::sink::PersistenceSink;

type Responder = Arc<dyn Fn(&TabHandle, &Message) -> Option<Value> + Send + Sync>;

/// 방문 기록 시각 기준값 (밀리초)
const VISIT_CLOCK_BASE_MS: f64 = 1_600_000_000_000.5;

struct FakeState {
    next_id: i64,
    windows: HashMap<WindowId, WindowHandle>,
    tabs: HashMap<TabId, TabHandle>,
    created: Vec<TabHandle>,
    history: Vec<(String, f64)>,
    visit_clock_ms: f64,
    sent: Vec<(TabId, Message)>,
    notifications: Vec<(String, String)>,
    deleted: Vec<DeletionRange>,
    stalled_urls: HashSet<String>,
    refused_urls: HashSet<String>,
    private_allowed: bool,
    private_windows_fail: bool,
    uninstalled: bool,
    reply_delay: Duration,
    responder: Responder,
}

/// 인메모리 브라우저 호스트
pub struct FakeHost {
    state: Mutex<FakeState>,
    events: broadcast::Sender<HostEvent>,
}

fn echo_responder() -> Responder {
    Arc::new(|tab: &TabHandle, message: &Message| {
        let mut tab_info = serde_json::to_value(&message.tab_info).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut tab_info {
            map.insert("url".into(), json!(tab.url));
        }
        Some(json!({
            "tab_info": tab_info,
            "html": format!("<html>{}</html>", tab.url),
        }))
    })
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            state: Mutex::new(FakeState {
                next_id: 1,
                windows: HashMap::new(),
                tabs: HashMap::new(),
                created: Vec::new(),
                history: Vec::new(),
                visit_clock_ms: VISIT_CLOCK_BASE_MS,
                sent: Vec::new(),
                notifications: Vec::new(),
                deleted: Vec::new(),
                stalled_urls: HashSet::new(),
                refused_urls: HashSet::new(),
                private_allowed: true,
                private_windows_fail: false,
                uninstalled: false,
                reply_delay: Duration::ZERO,
                responder: echo_responder(),
            }),
            events,
        }
    }

    /// 비공개 창 권한 설정
    pub fn set_private_allowed(&self, allowed: bool) {
        self.state.lock().private_allowed = allowed;
    }

    /// 페이지 스크립트 응답기 교체
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&TabHandle, &Message) -> Option<Value> + Send + Sync + 'static,
    {
        self.state.lock().responder = Arc::new(responder);
    }

    /// 응답 지연 설정
    pub fn set_reply_delay(&self, delay: Duration) {
        self.state.lock().reply_delay = delay;
    }

    /// 이 URL을 여는 탭은 로드 완료 이벤트를 보내지 않는다
    pub fn stall_url(&self, url: &str) {
        self.state.lock().stalled_urls.insert(url.to_string());
    }

    /// 이 URL로 탭을 만들면 실패한다
    pub fn refuse_url(&self, url: &str) {
        self.state.lock().refused_urls.insert(url.to_string());
    }

    /// 권한 확인은 통과하지만 비공개 창 생성은 실패 (브라우저 정책 등)
    pub fn fail_private_windows(&self, failing: bool) {
        self.state.lock().private_windows_fail = failing;
    }

    /// 사용자 방문 기록 추가
    pub fn add_history(&self, url: &str, visit_time_ms: f64) {
        self.state.lock().history.push((url.to_string(), visit_time_ms));
    }

    /// 호스트 이벤트 발생
    pub fn emit(&self, event: HostEvent) {
        let _ = self.events.send(event);
    }

    /// 생성된 탭 전체 (닫힌 탭 포함)
    pub fn created_tabs(&self) -> Vec<TabHandle> {
        self.state.lock().created.clone()
    }

    /// 보낸 메시지
    pub fn sent_messages(&self) -> Vec<(TabId, Message)> {
        self.state.lock().sent.clone()
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.state.lock().notifications.clone()
    }

    pub fn history(&self) -> Vec<(String, f64)> {
        self.state.lock().history.clone()
    }

    pub fn deleted_ranges(&self) -> Vec<DeletionRange> {
        self.state.lock().deleted.clone()
    }

    pub fn open_tab_count(&self) -> usize {
        self.state.lock().tabs.len()
    }

    pub fn open_window_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    pub fn uninstalled(&self) -> bool {
        self.state.lock().uninstalled
    }

    fn missing_tab(tab_id: TabId) -> CoreError {
        CoreError::Host(format!("No tab with id: {tab_id}"))
    }
}

#[async_trait]
impl BrowserHost for FakeHost {
    async fn create_window(&self, private: bool) -> Result<WindowHandle, CoreError> {
        let mut state = self.state.lock();
        if private && (!state.private_allowed || state.private_windows_fail) {
            return Err(CoreError::Host("비공개 창 권한 없음".into()));
        }
        let window_id = state.next_id;
        let root_id = state.next_id + 1;
        state.next_id += 2;

        let root = TabHandle {
            id: root_id,
            window_id,
            url: "about:blank".into(),
            private,
        };
        state.tabs.insert(root_id, root);
        let window = WindowHandle {
            id: window_id,
            private,
            root_tab: Some(root_id),
        };
        state.windows.insert(window_id, window.clone());
        Ok(window)
    }

    async fn minimize_window(&self, window_id: WindowId) -> Result<(), CoreError> {
        if self.state.lock().windows.contains_key(&window_id) {
            Ok(())
        } else {
            Err(CoreError::Host(format!("No window with id: {window_id}")))
        }
    }

    async fn remove_window(&self, window_id: WindowId) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        state
            .windows
            .remove(&window_id)
            .ok_or_else(|| CoreError::Host(format!("No window with id: {window_id}")))?;
        state.tabs.retain(|_, tab| tab.window_id != window_id);
        Ok(())
    }

    async fn create_tab(&self, window_id: WindowId, url: &str) -> Result<TabHandle, CoreError> {
        let (tab, visit, stalled) = {
            let mut state = self.state.lock();
            if state.refused_urls.contains(url) {
                return Err(CoreError::Host(format!("탭 생성 거부: {url}")));
            }
            let private = state
                .windows
                .get(&window_id)
                .map(|w| w.private)
                .ok_or_else(|| CoreError::Host(format!("No window with id: {window_id}")))?;
            let tab = TabHandle {
                id: state.next_id,
                window_id,
                url: url.to_string(),
                private,
            };
            state.next_id += 1;
            state.tabs.insert(tab.id, tab.clone());
            state.created.push(tab.clone());

            let stalled = state.stalled_urls.contains(url);
            let visit = if !private && !stalled {
                state.visit_clock_ms += 1_000.0;
                let t = state.visit_clock_ms;
                state.history.push((url.to_string(), t));
                Some(t)
            } else {
                None
            };
            (tab, visit, stalled)
        };

        if !stalled {
            self.emit(HostEvent::TabUpdated {
                tab: tab.clone(),
                status: TabStatus::Complete,
            });
        }
        if let Some(visit_time_ms) = visit {
            self.emit(HostEvent::HistoryVisited {
                url: url.to_string(),
                visit_time_ms,
            });
        }
        Ok(tab)
    }

    async fn navigate_tab(&self, tab_id: TabId, url: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        let tab = state
            .tabs
            .get_mut(&tab_id)
            .ok_or_else(|| Self::missing_tab(tab_id))?;
        tab.url = url.to_string();
        Ok(())
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<TabHandle, CoreError> {
        self.state
            .lock()
            .tabs
            .get(&tab_id)
            .cloned()
            .ok_or_else(|| Self::missing_tab(tab_id))
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<(), CoreError> {
        self.state
            .lock()
            .tabs
            .remove(&tab_id)
            .map(|_| ())
            .ok_or_else(|| Self::missing_tab(tab_id))
    }

    async fn send_tab_message(
        &self,
        tab_id: TabId,
        message: &Message,
    ) -> Result<Option<Value>, CoreError> {
        let (tab, delay, responder) = {
            let mut state = self.state.lock();
            let tab = state
                .tabs
                .get(&tab_id)
                .cloned()
                .ok_or_else(|| Self::missing_tab(tab_id))?;
            state.sent.push((tab_id, message.clone()));
            (tab, state.reply_delay, state.responder.clone())
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(responder(&tab, message))
    }

    async fn search_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryItem>, CoreError> {
        let state = self.state.lock();
        let mut latest: HashMap<&str, (f64, u32)> = HashMap::new();
        for (url, t) in &state.history {
            let in_range = *t >= query.start_time_ms as f64 && *t <= query.end_time_ms as f64;
            if in_range && url.contains(query.text.as_str()) {
                let entry = latest.entry(url.as_str()).or_insert((*t, 0));
                entry.0 = entry.0.max(*t);
                entry.1 += 1;
            }
        }
        let mut items: Vec<HistoryItem> = latest
            .into_iter()
            .map(|(url, (t, count))| HistoryItem {
                url: url.to_string(),
                title: None,
                last_visit_time_ms: Some(t),
                visit_count: Some(count),
            })
            .collect();
        items.sort_by(|a, b| a.url.cmp(&b.url));
        items.truncate(query.max_results as usize);
        Ok(items)
    }

    async fn get_visits(&self, url: &str) -> Result<Vec<Value>, CoreError> {
        Ok(self
            .state
            .lock()
            .history
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, t)| json!({ "visit_time": t }))
            .collect())
    }

    async fn delete_history_range(&self, range: DeletionRange) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        state.history.retain(|(_, t)| !range.contains(*t));
        state.deleted.push(range);
        Ok(())
    }

    async fn private_contexts_allowed(&self) -> Result<bool, CoreError> {
        Ok(self.state.lock().private_allowed)
    }

    async fn uninstall_self(&self) -> Result<(), CoreError> {
        self.state.lock().uninstalled = true;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl Notifier for FakeHost {
    async fn show_notification(&self, title: &str, body: &str) -> Result<(), CoreError> {
        self.state
            .lock()
            .notifications
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

/// 저장 요청을 기록하는 저장 서버 (테스트용)
#[derive(Default)]
pub struct RecordingSink {
    saved: Mutex<Vec<(String, ApiKind, Value)>>,
    failing: std::sync::atomic::AtomicBool,
}

impl RecordingSink {
    /// 이후 저장 요청을 모두 거부
    pub fn fail_all(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// (job_id, api, payload) 목록
    pub fn saved(&self) -> Vec<(String, ApiKind, Value)> {
        self.saved.lock().clone()
    }

    /// 특정 API로 저장된 페이로드
    pub fn saved_for(&self, api: ApiKind) -> Vec<Value> {
        self.saved
            .lock()
            .iter()
            .filter(|(_, a, _)| *a == api)
            .map(|(_, _, v)| v.clone())
            .collect()
    }
}

#[async_trait]
impl PersistenceSink for RecordingSink {
    async fn save(&self, job_id: &str, api: ApiKind, payload: Value) -> Result<(), CoreError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CoreError::Rejected("테스트 거부".into()));
        }
        self.saved.lock().push((job_id.to_string(), api, payload));
        Ok(())
    }
}
