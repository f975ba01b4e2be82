//! 주기 스냅샷 작업.

use async_trait::async_trait;
use webusage_core::error::CoreError;
use webusage_core::models::job::{ApiKind, JobConfig};

use crate::context::OrchestratorContext;
use crate::dispatcher::{JobHandler, JobOutcome};
use crate::snapshot::SnapshotOrchestrator;

pub struct PeriodicSnapshotsHandler;

#[async_trait]
impl JobHandler for PeriodicSnapshotsHandler {
    fn api(&self) -> ApiKind {
        ApiKind::PeriodicSnapshots
    }

    async fn handle(
        &self,
        ctx: &OrchestratorContext,
        job: &JobConfig,
    ) -> Result<JobOutcome, CoreError> {
        SnapshotOrchestrator::new(ctx, job).run().await
    }
}
