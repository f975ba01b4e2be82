//! 연구 기간 만료 검사.
//!
//! 시작할 때와 `check_interval_hours`마다 `expires_at`을 확인한다.
//! 지났으면 브라우저 쪽 확장을 제거하고 프로세스 종료 신호를 올린다.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use webusage_core::config::ExpirationConfig;
use webusage_core::ports::browser_host::BrowserHost;

use crate::lifecycle::LifecycleManager;

pub struct ExpirationGuard {
    config: ExpirationConfig,
    host: Arc<dyn BrowserHost>,
    lifecycle: Arc<LifecycleManager>,
}

impl ExpirationGuard {
    pub fn new(
        config: ExpirationConfig,
        host: Arc<dyn BrowserHost>,
        lifecycle: Arc<LifecycleManager>,
    ) -> Self {
        Self {
            config,
            host,
            lifecycle,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.config.expires_at.is_some_and(|at| now >= at)
    }

    /// 한 번 검사. 만료됐으면 제거 요청 후 종료 신호, true 반환.
    pub async fn check(&self, now: DateTime<Utc>) -> bool {
        if !self.is_expired(now) {
            return false;
        }
        info!("연구 기간 만료, 확장 제거");
        if let Err(e) = self.host.uninstall_self().await {
            warn!("확장 제거 요청 실패: {e}");
        }
        self.lifecycle.shutdown("연구 기간 만료");
        true
    }

    /// 종료 신호까지 주기적으로 검사
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let Some(expires_at) = self.config.expires_at else {
            debug!("만료 시각 없음, 검사 안 함");
            return;
        };
        debug!("만료 시각: {expires_at}");

        let period = self.config.check_interval().max(Duration::from_secs(60));
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.check(Utc::now()).await {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use webusage_monitor::testing::FakeHost;

    fn guard(expires_at: Option<DateTime<Utc>>) -> (ExpirationGuard, Arc<FakeHost>, Arc<LifecycleManager>) {
        let host = Arc::new(FakeHost::new());
        let lifecycle = Arc::new(LifecycleManager::new());
        let config = ExpirationConfig {
            expires_at,
            ..Default::default()
        };
        (
            ExpirationGuard::new(config, host.clone(), lifecycle.clone()),
            host,
            lifecycle,
        )
    }

    #[tokio::test]
    async fn expired_study_uninstalls_and_shuts_down() {
        let now = Utc::now();
        let (guard, host, lifecycle) = guard(Some(now - Duration::hours(1)));
        assert!(guard.check(now).await);
        assert!(host.uninstalled());
        assert!(lifecycle.is_shutting_down());
    }

    #[tokio::test]
    async fn future_expiry_does_nothing() {
        let now = Utc::now();
        let (guard, host, lifecycle) = guard(Some(now + Duration::days(30)));
        assert!(!guard.check(now).await);
        assert!(!host.uninstalled());
        assert!(!lifecycle.is_shutting_down());
    }

    #[tokio::test]
    async fn no_expiry_never_expires() {
        let (guard, _, _) = guard(None);
        assert!(!guard.is_expired(Utc::now() + Duration::days(10_000)));
    }

    #[tokio::test(start_paused = true)]
    async fn run_checks_immediately() {
        let (guard, host, lifecycle) = guard(Some(Utc::now() - Duration::minutes(1)));
        let shutdown = lifecycle.subscribe();
        guard.run(shutdown).await;
        assert!(host.uninstalled());
    }
}
