//! 체크포인트 저장소 포트.
//!
//! 구현: `webusage-storage` crate (rusqlite)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::checkpoint::Checkpoint;

/// 작업별 체크포인트 키-값 저장소
///
/// 키 단위 last-write-wins. 여러 키에 걸친 트랜잭션은 없다.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 체크포인트 조회 (없으면 `None`)
    async fn get(&self, job_id: &str) -> Result<Option<Checkpoint>, CoreError>;

    /// 체크포인트 기록 (덮어쓰기)
    async fn set(&self, job_id: &str, checkpoint: &Checkpoint) -> Result<(), CoreError>;

    /// 전체 체크포인트 (작업 ID 순)
    async fn list(&self) -> Result<Vec<(String, Checkpoint)>, CoreError>;
}
