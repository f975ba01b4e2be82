//! API 종류별 작업 핸들러.
//!
//! - `browser_history`: 브라우저 방문 기록 증분 수집
//! - `website_history`: 외부 페이지 조회 (전체 재수집 / 증분)
//! - `activity`: 활동 추적 루프 시작
//! - `periodic_snapshots`: 스냅샷 배치

mod activity;
mod browser_history;
mod periodic_snapshots;
mod website_history;

pub use activity::ActivityHandler;
pub use browser_history::BrowserHistoryHandler;
pub use periodic_snapshots::PeriodicSnapshotsHandler;
pub use website_history::WebsiteHistoryHandler;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use webusage_core::error::CoreError;
use webusage_core::models::job::JobConfig;
use webusage_core::models::window::TimeWindow;

use crate::context::OrchestratorContext;
use crate::dispatcher::JobOutcome;
use crate::interval::compute_window;
use crate::lease::JobLease;

/// 증분 창 하나를 수집하는 쪽
#[async_trait]
trait WindowCollector: Send + Sync {
    async fn collect_window(
        &self,
        ctx: &OrchestratorContext,
        job: &JobConfig,
        window: &TimeWindow,
    ) -> Result<(), CoreError>;
}

/// 밀린 증분 창을 하나씩 수집
///
/// 창 하나가 끝날 때마다 `complete`를 기록하고, 잠시 쉰 뒤 다음 창을 계산한다.
/// 수집이 실패하면 잡기 전 체크포인트로 되돌리고 에러를 돌려준다.
async fn catch_up<C>(
    collector: &C,
    ctx: &OrchestratorContext,
    job: &JobConfig,
) -> Result<JobOutcome, CoreError>
where
    C: WindowCollector + ?Sized,
{
    let job_id = job.job_id.as_str();
    let mut windows = 0;

    loop {
        let checkpoint = ctx.checkpoint(job_id).await?;
        let window = compute_window(&checkpoint, job, Utc::now())?;
        if !window.should_run {
            break;
        }
        let Some(lease) = JobLease::acquire(ctx, job_id, &checkpoint, &window).await? else {
            if windows == 0 {
                return Ok(JobOutcome::Busy);
            }
            break;
        };

        if let Err(e) = collector.collect_window(ctx, job, &window).await {
            if let Err(restore) = lease.abandon().await {
                warn!("[{job_id}] 체크포인트 복원 실패: {restore}");
            }
            return Err(e);
        }
        lease.complete(window.end).await?;
        windows += 1;
        info!("[{job_id}] 창 수집 완료: {} ~ {}", window.start, window.end);

        if !ctx.pause(ctx.config.history.catch_up_delay()).await {
            break;
        }
    }

    Ok(if windows == 0 {
        JobOutcome::NotDue
    } else {
        JobOutcome::Collected { windows }
    })
}
