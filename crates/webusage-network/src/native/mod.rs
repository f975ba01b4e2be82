//! 네이티브 메시징 브라우저 브리지.
//!
//! 브라우저 쪽 shim이 이 프로세스를 띄우고 stdin/stdout으로 프레임을 주고받는다.
//!
//! - 요청: `{"id": n, "call": "...", "args": {...}}`
//! - 응답: `{"id": n, "ok": ...}` 또는 `{"id": n, "error": "..."}`
//! - 이벤트: `{"event": {"type": "...", ...}}` (요청 없이 도착)
//!
//! 수신 태스크 하나가 응답을 대기 중인 호출에 전달하고 이벤트를 broadcast한다.

pub mod frame;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webusage_core::error::CoreError;
use webusage_core::models::host::{
    DeletionRange, HistoryItem, HistoryQuery, HostEvent, TabHandle, TabId, WindowHandle, WindowId,
};
use webusage_core::models::message::Message;
use webusage_core::ports::browser_host::BrowserHost;
use webusage_core::ports::notifier::Notifier;

use self::frame::{read_frame, write_frame};

/// 이벤트 채널 버퍼 크기
const EVENT_CAPACITY: usize = 256;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, String>>>>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    call: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Incoming {
    Event {
        event: HostEvent,
    },
    Reply {
        id: u64,
        #[serde(default)]
        ok: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// 네이티브 메시징 브리지 (`BrowserHost` + `Notifier`)
pub struct NativeBridge {
    writer: tokio::sync::Mutex<Writer>,
    pending: Pending,
    next_id: AtomicU64,
    events: broadcast::Sender<HostEvent>,
    call_timeout: Duration,
}

impl NativeBridge {
    /// 임의의 스트림 위에서 브리지 시작. 반환된 핸들은 브라우저 쪽 스트림이 닫히면 끝난다.
    pub fn start<R, W>(reader: R, writer: W, call_timeout: Duration) -> (Arc<Self>, JoinHandle<()>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let bridge = Arc::new(Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending: pending.clone(),
            next_id: AtomicU64::new(1),
            events: events.clone(),
            call_timeout,
        });

        let handle = tokio::spawn(Self::read_loop(reader, pending, events));
        (bridge, handle)
    }

    /// 표준 입출력 위의 브리지
    pub fn stdio(call_timeout: Duration) -> (Arc<Self>, JoinHandle<()>) {
        Self::start(tokio::io::stdin(), tokio::io::stdout(), call_timeout)
    }

    /// 수신 루프
    async fn read_loop<R>(mut reader: R, pending: Pending, events: broadcast::Sender<HostEvent>)
    where
        R: AsyncRead + Unpin,
    {
        loop {
            match read_frame::<_, Value>(&mut reader).await {
                Ok(Some(raw)) => Self::dispatch(raw, &pending, &events),
                Ok(None) => {
                    info!("브라우저 연결 종료");
                    break;
                }
                Err(CoreError::Serialization(e)) => warn!("잘못된 프레임 무시: {e}"),
                Err(e) => {
                    warn!("브라우저 스트림 읽기 실패: {e}");
                    break;
                }
            }
        }

        for (_, tx) in pending.lock().drain() {
            let _ = tx.send(Err("브라우저 연결 종료".to_string()));
        }
        debug!("브리지 수신 루프 종료");
    }

    fn dispatch(raw: Value, pending: &Pending, events: &broadcast::Sender<HostEvent>) {
        match serde_json::from_value::<Incoming>(raw) {
            Ok(Incoming::Event { event }) => {
                // 구독자가 없으면 버린다
                let _ = events.send(event);
            }
            Ok(Incoming::Reply { id, ok, error }) => {
                let result = match error {
                    Some(error) => Err(error),
                    None => Ok(ok.unwrap_or(Value::Null)),
                };
                match pending.lock().remove(&id) {
                    Some(tx) => {
                        let _ = tx.send(result);
                    }
                    None => debug!("대기 중이 아닌 응답 무시: id={id}"),
                }
            }
            Err(e) => warn!("알 수 없는 프레임 무시: {e}"),
        }
    }

    /// 호출 하나를 보내고 응답을 기다림
    async fn call_raw(&self, call: &str, args: Value) -> Result<Value, CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let request = Request { id, call, args };
        let written = {
            let mut writer = self.writer.lock().await;
            write_frame(&mut *writer, &request).await
        };
        if let Err(e) = written {
            self.pending.lock().remove(&id);
            return Err(CoreError::Host(format!("{call} 전송 실패: {e}")));
        }

        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(CoreError::Host(format!("{call}: {message}"))),
            Ok(Err(_)) => Err(CoreError::Host(format!("{call}: 브라우저 연결 종료"))),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CoreError::ExecutionTimeout {
                    timeout_ms: self.call_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn call<T: DeserializeOwned>(&self, call: &str, args: Value) -> Result<T, CoreError> {
        let value = self.call_raw(call, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 응답 값을 쓰지 않는 호출
    async fn call_unit(&self, call: &str, args: Value) -> Result<(), CoreError> {
        self.call_raw(call, args).await.map(|_| ())
    }

    /// 응답 대기 중인 호출 수
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }
}

#[async_trait]
impl BrowserHost for NativeBridge {
    async fn create_window(&self, private: bool) -> Result<WindowHandle, CoreError> {
        self.call("create_window", json!({ "private": private })).await
    }

    async fn minimize_window(&self, window_id: WindowId) -> Result<(), CoreError> {
        self.call_unit("minimize_window", json!({ "window_id": window_id }))
            .await
    }

    async fn remove_window(&self, window_id: WindowId) -> Result<(), CoreError> {
        self.call_unit("remove_window", json!({ "window_id": window_id }))
            .await
    }

    async fn create_tab(&self, window_id: WindowId, url: &str) -> Result<TabHandle, CoreError> {
        self.call(
            "create_tab",
            json!({ "window_id": window_id, "url": url, "active": false }),
        )
        .await
    }

    async fn navigate_tab(&self, tab_id: TabId, url: &str) -> Result<(), CoreError> {
        self.call_unit("navigate_tab", json!({ "tab_id": tab_id, "url": url }))
            .await
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<TabHandle, CoreError> {
        self.call("get_tab", json!({ "tab_id": tab_id })).await
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<(), CoreError> {
        self.call_unit("remove_tab", json!({ "tab_id": tab_id })).await
    }

    async fn send_tab_message(
        &self,
        tab_id: TabId,
        message: &Message,
    ) -> Result<Option<Value>, CoreError> {
        let value = self
            .call_raw(
                "send_tab_message",
                json!({ "tab_id": tab_id, "message": message }),
            )
            .await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn search_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryItem>, CoreError> {
        self.call("search_history", serde_json::to_value(query)?).await
    }

    async fn get_visits(&self, url: &str) -> Result<Vec<Value>, CoreError> {
        self.call("get_visits", json!({ "url": url })).await
    }

    async fn delete_history_range(&self, range: DeletionRange) -> Result<(), CoreError> {
        self.call_unit("delete_history_range", serde_json::to_value(range)?)
            .await
    }

    async fn private_contexts_allowed(&self) -> Result<bool, CoreError> {
        self.call("private_contexts_allowed", Value::Null).await
    }

    async fn uninstall_self(&self) -> Result<(), CoreError> {
        self.call_unit("uninstall_self", Value::Null).await
    }

    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl Notifier for NativeBridge {
    async fn show_notification(&self, title: &str, body: &str) -> Result<(), CoreError> {
        self.call_unit("show_notification", json!({ "title": title, "body": body }))
            .await
    }
}
