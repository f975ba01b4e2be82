//! 작업 디스패처.
//!
//! `{job_id, config}` 요청을 API 종류별 핸들러로 보낸다.
//! 같은 작업의 동시 실행을 막지 않는다. 체크포인트 상태가 실행 여부를 정한다.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use webusage_core::error::CoreError;
use webusage_core::models::checkpoint::Checkpoint;
use webusage_core::models::job::{ApiKind, JobConfig};

use crate::context::OrchestratorContext;
use crate::handlers::{
    ActivityHandler, BrowserHistoryHandler, PeriodicSnapshotsHandler, WebsiteHistoryHandler,
};
use crate::snapshot::BatchReport;

/// 핸들러 실행 결과
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// 시간 창 미도래
    NotDue,
    /// 같은 실행이 lease를 잡고 있음
    Busy,
    /// 증분 창 `windows`개 수집 완료
    Collected { windows: usize },
    /// 장기 실행 루프 시작 (또는 이미 실행 중)
    Started,
    /// 스냅샷 배치 완료
    Batch(BatchReport),
    /// 종료 신호로 중단 (진행 위치는 남김)
    Cancelled,
}

/// API 종류 하나를 처리하는 핸들러
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 처리하는 API 종류
    fn api(&self) -> ApiKind;

    async fn handle(
        &self,
        ctx: &OrchestratorContext,
        job: &JobConfig,
    ) -> Result<JobOutcome, CoreError>;
}

/// 디스패치 요청
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: String,
    pub config: JobConfig,
}

impl JobRequest {
    pub fn new(config: JobConfig) -> Self {
        Self {
            job_id: config.job_id.clone(),
            config,
        }
    }
}

/// 작업 디스패처
pub struct JobDispatcher {
    handlers: HashMap<ApiKind, Arc<dyn JobHandler>>,
}

impl JobDispatcher {
    /// 핸들러 없는 디스패처
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// 네 가지 API 핸들러를 모두 등록한 디스패처
    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register_handler(ApiKind::BrowserHistory, Arc::new(BrowserHistoryHandler));
        dispatcher.register_handler(ApiKind::WebsiteHistory, Arc::new(WebsiteHistoryHandler));
        dispatcher.register_handler(ApiKind::Activity, Arc::new(ActivityHandler::new()));
        dispatcher.register_handler(
            ApiKind::PeriodicSnapshots,
            Arc::new(PeriodicSnapshotsHandler),
        );
        dispatcher
    }

    /// 핸들러 등록 (같은 종류는 교체)
    pub fn register_handler(&mut self, api: ApiKind, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(api, handler);
    }

    /// 체크포인트가 없는 작업에 `init` 기록
    pub async fn register_jobs(
        &self,
        ctx: &OrchestratorContext,
        jobs: &[JobConfig],
    ) -> Result<(), CoreError> {
        let now = chrono::Utc::now();
        for job in jobs {
            if ctx.checkpoints.get(&job.job_id).await?.is_none() {
                ctx.checkpoints
                    .set(&job.job_id, &Checkpoint::init(now))
                    .await?;
                info!("[{}] 작업 등록: {}", job.job_id, job.api);
            }
        }
        Ok(())
    }

    /// 요청 하나 실행
    ///
    /// 요청 ID와 설정 ID가 다르거나, 핸들러가 다른 종류를 처리하면 바로 실패한다.
    pub async fn dispatch(
        &self,
        ctx: &OrchestratorContext,
        request: &JobRequest,
    ) -> Result<JobOutcome, CoreError> {
        if request.job_id != request.config.job_id {
            return Err(CoreError::Validation {
                field: "job_id".to_string(),
                message: format!(
                    "요청 {}와 설정 {} 불일치",
                    request.job_id, request.config.job_id
                ),
            });
        }

        let api = request.config.api;
        let handler = self.handlers.get(&api).ok_or_else(|| CoreError::NotFound {
            resource_type: "핸들러".to_string(),
            id: api.to_string(),
        })?;

        if handler.api() != api {
            return Err(CoreError::Validation {
                field: "api".to_string(),
                message: format!("핸들러 {}가 {api} 요청을 받음", handler.api()),
            });
        }

        debug!("[{}] 디스패치: {api}", request.job_id);
        handler.handle(ctx, &request.config).await
    }

    /// 모든 작업을 각자의 태스크로 실행. 에러는 작업 경계에서 로그로 남긴다.
    pub fn dispatch_all(
        self: &Arc<Self>,
        ctx: &Arc<OrchestratorContext>,
        jobs: &[JobConfig],
    ) -> Vec<JoinHandle<()>> {
        jobs.iter()
            .cloned()
            .map(|job| {
                let dispatcher = self.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let request = JobRequest::new(job);
                    match dispatcher.dispatch(&ctx, &request).await {
                        Ok(outcome) => debug!("[{}] 결과: {outcome:?}", request.job_id),
                        Err(e @ CoreError::Config(_)) => error!("[{}] {e}", request.job_id),
                        Err(e) => warn!("[{}] 작업 실패: {e}", request.job_id),
                    }
                })
            })
            .collect()
    }

    /// 종료 신호까지 주기적으로 전체 작업 디스패치
    pub async fn run(self: Arc<Self>, ctx: Arc<OrchestratorContext>, jobs: Vec<JobConfig>) {
        let interval = ctx.config.schedule.redispatch_interval();
        info!(
            "디스패처 시작: 작업 {}개, 재디스패치 {}분",
            jobs.len(),
            interval.as_secs() / 60
        );

        if let Err(e) = self.register_jobs(&ctx, &jobs).await {
            error!("작업 등록 실패: {e}");
            return;
        }

        loop {
            self.dispatch_all(&ctx, &jobs);
            if !ctx.pause(interval).await {
                break;
            }
        }
        info!("디스패처 종료");
    }
}

impl Default for JobDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, Harness};
    use assert_matches::assert_matches;
    use webusage_core::config::AppConfig;

    /// 다른 종류를 처리한다고 답하는 핸들러
    struct Liar;

    #[async_trait]
    impl JobHandler for Liar {
        fn api(&self) -> ApiKind {
            ApiKind::Activity
        }

        async fn handle(
            &self,
            _ctx: &OrchestratorContext,
            _job: &JobConfig,
        ) -> Result<JobOutcome, CoreError> {
            Ok(JobOutcome::Started)
        }
    }

    fn context() -> Harness {
        harness(AppConfig::default_config())
    }

    #[tokio::test]
    async fn handler_kind_mismatch_fails_fast() {
        let Harness { ctx, .. } = context();
        let mut dispatcher = JobDispatcher::new();
        dispatcher.register_handler(ApiKind::BrowserHistory, Arc::new(Liar));

        let request = JobRequest::new(JobConfig::new("bh", ApiKind::BrowserHistory));
        assert_matches!(
            dispatcher.dispatch(&ctx, &request).await,
            Err(CoreError::Validation { field, .. }) if field == "api"
        );
    }

    #[tokio::test]
    async fn request_id_mismatch_rejected() {
        let Harness { ctx, .. } = context();
        let dispatcher = JobDispatcher::with_defaults();
        let request = JobRequest {
            job_id: "other".into(),
            config: JobConfig::new("bh", ApiKind::BrowserHistory),
        };
        assert_matches!(
            dispatcher.dispatch(&ctx, &request).await,
            Err(CoreError::Validation { field, .. }) if field == "job_id"
        );
    }

    #[tokio::test]
    async fn missing_handler_is_not_found() {
        let Harness { ctx, .. } = context();
        let dispatcher = JobDispatcher::new();
        let request = JobRequest::new(JobConfig::new("bh", ApiKind::BrowserHistory));
        assert_matches!(
            dispatcher.dispatch(&ctx, &request).await,
            Err(CoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn missing_policy_surfaces_config_error() {
        let Harness { ctx, .. } = context();
        let dispatcher = JobDispatcher::with_defaults();
        let request = JobRequest::new(JobConfig::new("bh", ApiKind::BrowserHistory));
        assert_matches!(
            dispatcher.dispatch(&ctx, &request).await,
            Err(CoreError::Config(_))
        );
    }

    #[tokio::test]
    async fn register_keeps_existing_checkpoints() {
        let Harness { ctx, .. } = context();
        let done = Checkpoint::complete(chrono::Utc::now());
        ctx.checkpoints.set("browser_history", &done).await.unwrap();

        let jobs = AppConfig::default_config().jobs;
        JobDispatcher::with_defaults()
            .register_jobs(&ctx, &jobs)
            .await
            .unwrap();

        assert_eq!(ctx.checkpoints.get("browser_history").await.unwrap(), Some(done));
        let listed = ctx.checkpoints.list().await.unwrap();
        assert_eq!(listed.len(), jobs.len());
        assert!(listed
            .iter()
            .filter(|(id, _)| id != "browser_history")
            .all(|(_, cp)| cp.is_init()));
    }
}
