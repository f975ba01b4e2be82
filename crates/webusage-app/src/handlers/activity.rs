//! 활동 추적 작업.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;
use webusage_core::error::CoreError;
use webusage_core::models::job::{ApiKind, JobConfig};

use crate::context::OrchestratorContext;
use crate::dispatcher::{JobHandler, JobOutcome};

/// 작업마다 활동 추적 루프를 한 번만 띄운다. 이후 디스패치는 아무것도 하지 않는다.
#[derive(Default)]
pub struct ActivityHandler {
    running: Mutex<HashSet<String>>,
}

impl ActivityHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.running.lock().contains(job_id)
    }
}

#[async_trait]
impl JobHandler for ActivityHandler {
    fn api(&self) -> ApiKind {
        ApiKind::Activity
    }

    async fn handle(
        &self,
        ctx: &OrchestratorContext,
        job: &JobConfig,
    ) -> Result<JobOutcome, CoreError> {
        if !self.running.lock().insert(job.job_id.clone()) {
            debug!("[{}] 활동 추적 이미 실행 중", job.job_id);
            return Ok(JobOutcome::Started);
        }

        let tracker = ctx.tracker.clone();
        tokio::spawn(tracker.run(job.clone(), ctx.host.subscribe(), ctx.shutdown()));
        Ok(JobOutcome::Started)
    }
}
