//! 외부 페이지/서버 조회 포트.
//!
//! 구현: `webusage-network` crate (reqwest)

use async_trait::async_trait;

use crate::error::CoreError;

/// 웹사이트 기록 페이지 조회
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET 요청 후 본문 텍스트 반환
    async fn fetch(&self, url: &str) -> Result<String, CoreError>;
}

/// 스냅샷 대상 URL 목록 제공자
#[async_trait]
pub trait TargetSource: Send + Sync {
    /// 현재 주기의 스냅샷 대상 URL
    async fn snapshot_targets(&self) -> Result<Vec<String>, CoreError>;
}
