//! 스냅샷 배치 오케스트레이터.

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use webusage_core::error::{CoreError, MessagingError};
use webusage_core::models::checkpoint::LeaseStatus;
use webusage_core::models::host::{HostEvent, TabHandle, TabId, TabStatus, WindowHandle};
use webusage_core::models::job::{ApiKind, JobConfig, Target};
use webusage_core::models::message::{Message, Subject};

use super::{BatchPhase, BatchReport, ContextReport, CycleProgress};
use crate::context::OrchestratorContext;
use crate::dispatcher::JobOutcome;
use crate::interval::{compute_window, stagger_due};
use crate::lease::JobLease;

/// 대상 하나의 실패 원인
#[derive(Debug, Error)]
enum TargetFailure {
    #[error("탭 열기 실패: {0}")]
    Open(#[source] CoreError),

    #[error("로드 타임아웃: {timeout_ms}ms 초과")]
    LoadTimeout { timeout_ms: u64 },

    #[error("로드 전에 탭이 닫힘")]
    Closed,

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("저장 실패: {0}")]
    Persist(#[source] CoreError),
}

/// 스냅샷 배치 오케스트레이터 (주기 하나)
pub struct SnapshotOrchestrator<'a> {
    ctx: &'a OrchestratorContext,
    job: &'a JobConfig,
    phase: Mutex<BatchPhase>,
}

impl<'a> SnapshotOrchestrator<'a> {
    pub fn new(ctx: &'a OrchestratorContext, job: &'a JobConfig) -> Self {
        Self {
            ctx,
            job,
            phase: Mutex::new(BatchPhase::Idle),
        }
    }

    /// 현재 단계
    pub fn phase(&self) -> BatchPhase {
        *self.phase.lock()
    }

    fn enter(&self, next: BatchPhase) {
        let mut phase = self.phase.lock();
        if *phase != next {
            debug!("[{}] 배치 단계: {} → {next}", self.job.job_id, *phase);
            *phase = next;
        }
    }

    /// 주기 하나 실행
    ///
    /// 시간 창이 안 됐으면 `NotDue`, 이 실행이 이미 배치를 돌리고 있으면 `Busy`.
    pub async fn run(&self) -> Result<JobOutcome, CoreError> {
        let job_id = self.job.job_id.as_str();
        let checkpoint = self.ctx.checkpoint(job_id).await?;
        let window = compute_window(&checkpoint, self.job, Utc::now())?;
        if !window.should_run {
            return Ok(JobOutcome::NotDue);
        }
        let ttl = self.ctx.config.snapshot.lease_ttl();
        if checkpoint.lease_status(&self.ctx.run_id, Utc::now(), ttl) == LeaseStatus::Held {
            return Ok(JobOutcome::Busy);
        }

        let targets = self.targets().await?;
        let private_allowed = match self.ctx.host.private_contexts_allowed().await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!("[{job_id}] 비공개 창 권한 확인 실패: {e}");
                false
            }
        };

        // Idle → Scheduled
        let start_delay = Duration::from_millis(self.job.batch.start_delay_ms);
        self.notify(start_delay, private_allowed).await;
        self.enter(BatchPhase::Scheduled);
        info!(
            "[{job_id}] 배치 예약: 대상 {}개, {}초 후 시작",
            targets.len(),
            start_delay.as_secs()
        );
        if !self.ctx.pause(start_delay).await {
            info!("[{job_id}] 종료 신호로 배치 취소");
            return Ok(JobOutcome::Cancelled);
        }

        // Scheduled → Running
        let current = self.ctx.checkpoint(job_id).await?;
        let Some(lease) = JobLease::acquire(self.ctx, job_id, &current, &window).await? else {
            return Ok(JobOutcome::Busy);
        };
        let resumed_from = lease.resume_index().min(targets.len());
        self.enter(BatchPhase::Running);

        let mut report = BatchReport {
            resumed_from,
            targets: targets.len(),
            contexts: Vec::new(),
            private_unavailable: !private_allowed,
        };
        if !private_allowed {
            info!("[{job_id}] 비공개 창 권한 없음, 표준 창만 실행");
        }

        let pending = &targets[resumed_from..];
        let contexts = if private_allowed { 2 } else { 1 };
        let progress = tokio::sync::Mutex::new(CycleProgress::new(lease, contexts));
        let started = Instant::now();

        let standard = self.run_context(0, false, pending, resumed_from, started, &progress);
        let results = if private_allowed {
            let private = self.run_context(1, true, pending, resumed_from, started, &progress);
            let (standard, private) = futures::join!(standard, private);
            vec![standard, private]
        } else {
            vec![standard.await]
        };

        let mut failure = None;
        for result in results {
            match result {
                Ok(context) => report.contexts.push(context),
                Err(e) => failure = Some(e),
            }
        }
        if report.contexts.iter().any(|c| c.unavailable) {
            report.private_unavailable = true;
        }

        let progress = progress.into_inner();
        if let Some(e) = failure {
            let at = progress.suspend();
            warn!("[{job_id}] 배치 중단, {at}번부터 재개 예정");
            return Err(e);
        }
        if report.contexts.iter().any(|c| c.interrupted) {
            let at = progress.suspend();
            info!("[{job_id}] 종료 신호로 배치 중단, {at}번부터 재개 예정");
            return Ok(JobOutcome::Cancelled);
        }

        progress.complete(window.end).await?;
        self.enter(BatchPhase::Complete);
        info!(
            "[{job_id}] 배치 완료: 수집 {}, 건너뜀 {}",
            report.collected(),
            report.skipped()
        );
        Ok(JobOutcome::Batch(report))
    }

    /// 대상 목록 (원격 목록 또는 작업 설정)
    async fn targets(&self) -> Result<Vec<Target>, CoreError> {
        if !self.job.remote_targets {
            return Ok(self.job.targets.clone());
        }
        let urls = self.ctx.targets.snapshot_targets().await?;
        debug!("[{}] 원격 대상 {}개", self.job.job_id, urls.len());
        Ok(urls.into_iter().map(Target::url).collect())
    }

    async fn notify(&self, start_delay: Duration, private_allowed: bool) {
        let minutes = (start_delay.as_secs() + 59) / 60;
        let windows = if private_allowed { "두 개" } else { "하나" };
        let body = format!(
            "{minutes}분 후 브라우저 창 {windows}가 열립니다. 잠시 동안 창을 닫지 말아 주세요. \
             수집이 끝나면 창은 자동으로 닫힙니다."
        );
        if let Err(e) = self
            .ctx
            .notifier
            .show_notification(&self.ctx.config.snapshot.notice_title, &body)
            .await
        {
            warn!("[{}] 배치 알림 실패: {e}", self.job.job_id);
        }
    }

    /// 컨텍스트(창) 하나에서 대상 목록 처리
    ///
    /// 대상 `i`는 배치 시작 후 `item_latency × (i + 1)`보다 먼저 열리지 않는다.
    async fn run_context(
        &self,
        slot: usize,
        private: bool,
        targets: &[Target],
        offset: usize,
        started: Instant,
        progress: &tokio::sync::Mutex<CycleProgress>,
    ) -> Result<ContextReport, CoreError> {
        let job_id = self.job.job_id.as_str();
        let mut report = ContextReport {
            private,
            ..Default::default()
        };

        let window = match self.open_window(private).await {
            Ok(window) => window,
            Err(e) if private => {
                warn!("[{job_id}] 비공개 창 열기 실패, 표준 창만 진행: {e}");
                progress.lock().await.retire(slot).await;
                report.unavailable = true;
                return Ok(report);
            }
            Err(e) => return Err(e),
        };
        let latency = Duration::from_millis(self.job.batch.item_latency_ms);

        for (position, target) in targets.iter().enumerate() {
            let due = stagger_due(started, latency, position);
            if !self.ctx.pause(due.saturating_duration_since(Instant::now())).await {
                report.interrupted = true;
                break;
            }

            match self.collect(&window, private, target).await {
                Ok(()) => report.collected.push(target.url.clone()),
                Err(e) => {
                    self.enter(BatchPhase::Draining);
                    match &e {
                        TargetFailure::Messaging(m) if m.is_informational() => {
                            info!("[{job_id}] 대상 건너뜀: {}: {m}", target.url)
                        }
                        _ => warn!("[{job_id}] 대상 건너뜀: {}: {e}", target.url),
                    }
                    report.skipped.push(target.url.clone());
                }
            }
            progress.lock().await.record(slot, offset + position + 1).await;
        }

        self.close_window(&window).await;
        Ok(report)
    }

    async fn open_window(&self, private: bool) -> Result<WindowHandle, CoreError> {
        let window = self.ctx.host.create_window(private).await?;
        if let Err(e) = self.ctx.host.minimize_window(window.id).await {
            debug!("[{}] 창 최소화 실패: {e}", self.job.job_id);
        }
        if let Some(root) = window.root_tab {
            self.ctx.generated.register(root);
            let landing = format!(
                "{}{}",
                self.ctx.config.server.base_url.trim_end_matches('/'),
                self.ctx.config.snapshot.landing_path
            );
            if let Err(e) = self.ctx.host.navigate_tab(root, &landing).await {
                debug!("[{}] 안내 페이지 열기 실패: {e}", self.job.job_id);
            }
        }
        Ok(window)
    }

    async fn close_window(&self, window: &WindowHandle) {
        if let Err(e) = self.ctx.host.remove_window(window.id).await {
            debug!("[{}] 창 닫기 실패: {e}", self.job.job_id);
        }
        if let Some(root) = window.root_tab {
            self.ctx.generated.release(root);
        }
    }

    /// 대상 하나: 탭 열기 → 로드 대기 → 스냅샷 요청 → 저장 → 탭 닫기
    async fn collect(
        &self,
        window: &WindowHandle,
        private: bool,
        target: &Target,
    ) -> Result<(), TargetFailure> {
        // 탭 생성과 동시에 로드 완료 이벤트가 올 수 있다
        let mut events = self.ctx.host.subscribe();
        if !private {
            self.ctx.compensator.expect(&self.job.job_id, &target.url);
        }

        let tab = match self.ctx.host.create_tab(window.id, &target.url).await {
            Ok(tab) => tab,
            Err(e) => {
                // 자동 방문이 생기지 않으므로 사용자 방문을 지우지 않게 철회
                if !private {
                    self.ctx.compensator.cancel(&self.job.job_id, &target.url);
                }
                return Err(TargetFailure::Open(e));
            }
        };
        self.ctx.generated.register(tab.id);

        let result = self.snapshot(&tab, &mut events, target).await;

        if let Err(e) = self.ctx.host.remove_tab(tab.id).await {
            debug!("[{}] 탭 닫기 실패: {e}", self.job.job_id);
        }
        self.ctx.generated.release(tab.id);
        result
    }

    async fn snapshot(
        &self,
        tab: &TabHandle,
        events: &mut broadcast::Receiver<HostEvent>,
        target: &Target,
    ) -> Result<(), TargetFailure> {
        let load_timeout = self.ctx.config.snapshot.load_timeout();
        tokio::time::timeout(load_timeout, wait_loaded(events, tab.id))
            .await
            .map_err(|_| TargetFailure::LoadTimeout {
                timeout_ms: load_timeout.as_millis() as u64,
            })??;

        let message = Message::to_content(ApiKind::PeriodicSnapshots.as_str(), Subject::Snapshot)
            .with_field("api_params", serde_json::to_value(self.job).unwrap_or(Value::Null));
        let response = self
            .ctx
            .channel
            .send(tab, message, self.ctx.config.snapshot.settle_delay())
            .await?;
        if response.is_private() != tab.private {
            return Err(MessagingError::PrivateContext.into());
        }

        let url = response.url();
        let url = if url.is_empty() { target.url.clone() } else { url };
        let mut data: Map<String, Value> = response.payload;
        data.insert("url".to_string(), json!(url));
        data.insert("is_private".to_string(), json!(tab.private));
        if let Some(name) = &target.name {
            data.entry("name").or_insert_with(|| json!(name));
        }

        self.ctx
            .router
            .route(self.job, ApiKind::PeriodicSnapshots, &url, Value::Object(data))
            .await
            .map_err(TargetFailure::Persist)
    }
}

/// 탭 로드 완료 이벤트 대기
async fn wait_loaded(
    events: &mut broadcast::Receiver<HostEvent>,
    tab_id: TabId,
) -> Result<(), TargetFailure> {
    loop {
        match events.recv().await {
            Ok(HostEvent::TabUpdated {
                tab,
                status: TabStatus::Complete,
            }) if tab.id == tab_id => return Ok(()),
            Ok(HostEvent::TabRemoved { tab_id: removed }) if removed == tab_id => {
                return Err(TargetFailure::Closed)
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return Err(TargetFailure::Closed),
        }
    }
}
