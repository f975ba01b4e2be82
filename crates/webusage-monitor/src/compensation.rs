//! 자동 방문 기록 보정.
//!
//! 오케스트레이터가 표준 창에서 연 대상마다 방문 기록 한 건을 기대값으로 등록한다.
//! 호스트가 일치하는 방문을 알리면 `[방문 시각 − 1ms, 방문 시각 + 1ms]` 범위만 삭제하고
//! 기대값을 제거한다. 탭이 먼저 닫혀도 기대값은 TTL 동안 남는다.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use webusage_core::error::CoreError;
use webusage_core::models::host::{DeletionRange, HostEvent};
use webusage_core::ports::browser_host::BrowserHost;

/// 삭제 범위 여유 (밀리초)
const VISIT_MARGIN_MS: f64 = 1.0;

#[derive(Debug, Clone)]
struct Expectation {
    job_id: String,
    target_url: String,
    registered_at: Instant,
}

/// 방문 기록 보정기
///
/// `(job_id, 대상 URL)` 기대값 테이블 하나를 프로세스 전체가 공유한다.
pub struct HistoryCompensator {
    host: Arc<dyn BrowserHost>,
    pending: Mutex<Vec<Expectation>>,
    ttl: Duration,
}

impl HistoryCompensator {
    pub fn new(host: Arc<dyn BrowserHost>, ttl: Duration) -> Self {
        Self {
            host,
            pending: Mutex::new(Vec::new()),
            ttl,
        }
    }

    /// 자동 방문 기대값 등록 (탭 생성 전에 호출)
    pub fn expect(&self, job_id: &str, target_url: &str) {
        self.pending.lock().push(Expectation {
            job_id: job_id.to_string(),
            target_url: target_url.to_string(),
            registered_at: Instant::now(),
        });
        debug!("[{job_id}] 방문 기록 보정 대기: {target_url}");
    }

    /// 기대값 하나 철회 (탭을 열지 못해 자동 방문이 생기지 않을 때)
    pub fn cancel(&self, job_id: &str, target_url: &str) {
        let mut pending = self.pending.lock();
        if let Some(idx) = pending
            .iter()
            .rposition(|e| e.job_id == job_id && e.target_url == target_url)
        {
            pending.remove(idx);
            debug!("[{job_id}] 방문 기록 보정 철회: {target_url}");
        }
    }

    /// 대기 중인 기대값 수
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// 방문 알림 처리. 일치하면 삭제한 범위를 돌려준다.
    pub async fn on_visit(
        &self,
        url: &str,
        visit_time_ms: f64,
    ) -> Result<Option<DeletionRange>, CoreError> {
        let matched = {
            let mut pending = self.pending.lock();
            let now = Instant::now();
            pending.retain(|e| now.duration_since(e.registered_at) <= self.ttl);
            pending
                .iter()
                .position(|e| url.contains(e.target_url.as_str()))
                .map(|idx| pending.remove(idx))
        };

        let Some(expectation) = matched else {
            return Ok(None);
        };

        let range = DeletionRange::around(visit_time_ms, VISIT_MARGIN_MS);
        self.host.delete_history_range(range).await?;
        info!(
            "[{}] 자동 방문 기록 삭제: {url} ({:.1}..{:.1})",
            expectation.job_id, range.start_ms, range.end_ms
        );
        Ok(Some(range))
    }

    /// 이벤트 루프. 방문 알림마다 보정을 시도한다.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<HostEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(HostEvent::HistoryVisited { url, visit_time_ms }) => {
                        if let Err(e) = self.on_visit(&url, visit_time_ms).await {
                            warn!("방문 기록 삭제 실패: {url}: {e}");
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("방문 기록 이벤트 {skipped}개 누락");
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
        debug!("방문 기록 보정 종료");
    }
}
