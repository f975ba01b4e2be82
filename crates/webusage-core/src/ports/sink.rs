//! 수집 결과 전달 포트.
//!
//! 구현: `webusage-network` crate (HTTP `save_data`)

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreError;
use crate::models::job::ApiKind;

/// 저장 서버
///
/// 성공은 서버가 `success`를 돌려준 경우뿐이다. 그 외는 모두 `Err`.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// 작업 결과 저장
    async fn save(&self, job_id: &str, api: ApiKind, payload: Value) -> Result<(), CoreError>;
}

/// 후처리기 (`process = true`인 작업의 결과 수신자)
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// 결과 후처리 후 전달
    async fn process(&self, job_id: &str, api: ApiKind, payload: Value) -> Result<(), CoreError>;
}
