//! 사용자 알림 포트.
//!
//! 구현: `webusage-network` crate (네이티브 메시징 브리지)

use async_trait::async_trait;

use crate::error::CoreError;

/// 사용자 알림 인터페이스 (fire-and-forget)
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 일반 알림 표시 (제목 + 본문)
    async fn show_notification(&self, title: &str, body: &str) -> Result<(), CoreError>;
}
