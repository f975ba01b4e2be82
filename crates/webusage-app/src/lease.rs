//! 작업 lease.
//!
//! 작업 하나는 체크포인트를 `in_progress`로 쓰면서 실행 권한을 잡고,
//! `complete`로 쓰면서 놓는다. lease 주인과 갱신 시각으로 멈춘 실행을 가려낸다.
//!
//! | 체크포인트 | 판정 |
//! |---|---|
//! | `init` / `complete` | 새로 잡는다 (`resume_index = 0`) |
//! | 다른 실행 ID의 `in_progress` | 이전 프로세스가 남긴 것, 바로 이어받는다 |
//! | 이 실행의 오래된 `in_progress` | TTL 초과, 이어받는다 |
//! | 이 실행의 최근 `in_progress` | 실행 중, 아무것도 하지 않는다 |

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use webusage_core::error::CoreError;
use webusage_core::models::checkpoint::{Checkpoint, Lease, LeaseStatus};
use webusage_core::models::window::TimeWindow;
use webusage_core::ports::checkpoint_store::CheckpointStore;

use crate::context::OrchestratorContext;

/// 잡은 lease
pub struct JobLease {
    store: Arc<dyn CheckpointStore>,
    job_id: String,
    owner: String,
    window_start: DateTime<Utc>,
    resume_index: usize,
    /// 잡기 전 체크포인트 (포기 시 복원)
    previous: Checkpoint,
}

impl JobLease {
    /// lease 획득 시도. 같은 실행이 이미 잡고 있으면 `None`.
    pub async fn acquire(
        ctx: &OrchestratorContext,
        job_id: &str,
        current: &Checkpoint,
        window: &TimeWindow,
    ) -> Result<Option<Self>, CoreError> {
        let now = Utc::now();
        let resume_index = match current.lease_status(&ctx.run_id, now, ctx.config.snapshot.lease_ttl())
        {
            LeaseStatus::Held => {
                debug!("[{job_id}] 실행 중인 lease 있음");
                return Ok(None);
            }
            LeaseStatus::Free => 0,
            LeaseStatus::Orphaned { resume_index } => {
                info!("[{job_id}] 중단된 실행 이어받음: {resume_index}번부터");
                resume_index
            }
            LeaseStatus::Stale { resume_index } => {
                info!("[{job_id}] 갱신 없는 lease 회수: {resume_index}번부터");
                resume_index
            }
        };

        let lease = Self {
            store: ctx.checkpoints.clone(),
            job_id: job_id.to_string(),
            owner: ctx.run_id.clone(),
            window_start: window.start,
            resume_index,
            previous: current.clone(),
        };
        lease.write(resume_index).await?;
        Ok(Some(lease))
    }

    /// 다음에 처리할 위치
    pub fn resume_index(&self) -> usize {
        self.resume_index
    }

    /// 진행 위치 기록 + lease 갱신
    pub async fn advance(&mut self, resume_index: usize) -> Result<(), CoreError> {
        self.write(resume_index).await?;
        self.resume_index = resume_index;
        Ok(())
    }

    /// 완료 기록 (논리적 창 끝 시각)
    pub async fn complete(self, end: DateTime<Utc>) -> Result<(), CoreError> {
        self.store.set(&self.job_id, &Checkpoint::complete(end)).await?;
        debug!("[{}] 완료: {end}", self.job_id);
        Ok(())
    }

    /// 진행 없이 포기. 잡기 전 체크포인트로 되돌린다.
    pub async fn abandon(self) -> Result<(), CoreError> {
        self.store.set(&self.job_id, &self.previous).await
    }

    async fn write(&self, resume_index: usize) -> Result<(), CoreError> {
        let lease = Lease {
            owner: self.owner.clone(),
            renewed_at: Utc::now(),
        };
        self.store
            .set(
                &self.job_id,
                &Checkpoint::in_progress(self.window_start, resume_index, lease),
            )
            .await
    }
}
