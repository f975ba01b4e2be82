//! 오케스트레이터 컨텍스트.
//!
//! 프로세스 수명 동안 유지되는 공유 상태(생성 탭 레지스트리, 포커스, 보정 테이블)와
//! 어댑터를 한곳에 묶어 모든 핸들러에 넘긴다.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;
use webusage_core::config::AppConfig;
use webusage_core::error::CoreError;
use webusage_core::models::checkpoint::Checkpoint;
use webusage_core::ports::browser_host::BrowserHost;
use webusage_core::ports::checkpoint_store::CheckpointStore;
use webusage_core::ports::fetcher::{PageFetcher, TargetSource};
use webusage_core::ports::notifier::Notifier;
use webusage_core::ports::sink::{PersistenceSink, PostProcessor};
use webusage_monitor::activity::ActivityTracker;
use webusage_monitor::compensation::HistoryCompensator;
use webusage_monitor::generated_tabs::GeneratedTabRegistry;
use webusage_monitor::messaging::{FocusState, MessagingChannel};
use webusage_monitor::redaction::RuleRedactor;
use webusage_monitor::routing::{PassthroughProcessor, PayloadRouter};

/// 외부 어댑터 묶음
pub struct Adapters {
    pub host: Arc<dyn BrowserHost>,
    pub notifier: Arc<dyn Notifier>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub sink: Arc<dyn PersistenceSink>,
    /// 없으면 저장 서버로 그대로 넘기는 후처리기
    pub processor: Option<Arc<dyn PostProcessor>>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub targets: Arc<dyn TargetSource>,
}

/// 오케스트레이터 컨텍스트
pub struct OrchestratorContext {
    pub config: AppConfig,
    /// 이 프로세스 실행 ID (lease 소유자)
    pub run_id: String,
    pub host: Arc<dyn BrowserHost>,
    pub notifier: Arc<dyn Notifier>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub targets: Arc<dyn TargetSource>,
    pub router: Arc<PayloadRouter>,
    pub channel: Arc<MessagingChannel>,
    pub generated: Arc<GeneratedTabRegistry>,
    pub compensator: Arc<HistoryCompensator>,
    pub tracker: Arc<ActivityTracker>,
    shutdown: watch::Receiver<bool>,
}

impl OrchestratorContext {
    pub fn new(config: AppConfig, adapters: Adapters, shutdown: watch::Receiver<bool>) -> Self {
        let Adapters {
            host,
            notifier,
            checkpoints,
            sink,
            processor,
            fetcher,
            targets,
        } = adapters;

        let focus = Arc::new(FocusState::new());
        let generated = Arc::new(GeneratedTabRegistry::new());
        let channel = Arc::new(MessagingChannel::new(
            host.clone(),
            focus.clone(),
            config.snapshot.response_timeout(),
        ));
        let processor =
            processor.unwrap_or_else(|| Arc::new(PassthroughProcessor::new(sink.clone())));
        let router = Arc::new(PayloadRouter::new(
            sink,
            processor,
            Arc::new(RuleRedactor::new(config.redaction.rules.clone())),
        ));
        let compensator = Arc::new(HistoryCompensator::new(
            host.clone(),
            config.snapshot.compensation_ttl(),
        ));
        let tracker = Arc::new(ActivityTracker::new(
            host.clone(),
            channel.clone(),
            generated.clone(),
            focus,
            router.clone(),
            config.activity.clone(),
        ));

        Self {
            config,
            run_id: Uuid::new_v4().to_string(),
            host,
            notifier,
            checkpoints,
            fetcher,
            targets,
            router,
            channel,
            generated,
            compensator,
            tracker,
            shutdown,
        }
    }

    /// 종료 수신기 복제
    pub fn shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// 종료 신호를 보며 대기. 끝까지 기다렸으면 true
    pub async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_shutting_down();
        }
        let mut shutdown = self.shutdown();
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_shutting_down(),
            true = async { shutdown.wait_for(|stop| *stop).await.is_ok() } => false,
        }
    }

    /// 작업 체크포인트 조회 (없으면 지금 시각의 init)
    pub async fn checkpoint(&self, job_id: &str) -> Result<Checkpoint, CoreError> {
        Ok(self
            .checkpoints
            .get(job_id)
            .await?
            .unwrap_or_else(|| Checkpoint::init(Utc::now())))
    }

    /// 방문 기록 보정 루프 시작
    pub fn spawn_background(&self) -> JoinHandle<()> {
        tokio::spawn(
            self.compensator
                .clone()
                .run(self.host.subscribe(), self.shutdown()),
        )
    }
}
