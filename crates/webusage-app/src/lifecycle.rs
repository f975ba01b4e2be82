//! 라이프사이클 관리.
//!
//! 종료 신호 하나를 모든 루프가 공유한다. OS 시그널, 브라우저 연결 종료,
//! 만료 검사가 같은 신호를 올린다.

use tokio::sync::watch;
use tracing::{info, warn};

/// 라이프사이클 관리자
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    /// 종료 수신기 복제
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// 종료 신호 발송 (두 번째부터는 무시)
    pub fn shutdown(&self, reason: &str) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        info!("종료 신호 발송: {reason}");
    }

    /// OS 시그널 대기 (SIGINT, SIGTERM) 후 종료 신호
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(mut sigint), Ok(mut sigterm)) => {
                    tokio::select! {
                        _ = sigint.recv() => self.shutdown("SIGINT"),
                        _ = sigterm.recv() => self.shutdown("SIGTERM"),
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!("시그널 핸들러 등록 실패: {e}");
                }
            }
        }

        #[cfg(not(unix))]
        {
            match tokio::signal::ctrl_c().await {
                Ok(()) => self.shutdown("Ctrl+C"),
                Err(e) => warn!("Ctrl+C 핸들러 등록 실패: {e}"),
            }
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_creation() {
        let lm = LifecycleManager::new();
        let rx = lm.subscribe();
        assert!(!*rx.borrow());
        assert!(!lm.is_shutting_down());
    }

    #[test]
    fn shutdown_signal_is_sticky() {
        let lm = LifecycleManager::new();
        let rx = lm.subscribe();
        lm.shutdown("test");
        lm.shutdown("again");
        assert!(*rx.borrow());
        assert!(lm.is_shutting_down());
    }

    #[tokio::test]
    async fn subscribers_wake_on_shutdown() {
        let lm = LifecycleManager::new();
        let mut rx = lm.subscribe();
        let waiter = tokio::spawn(async move { rx.wait_for(|stop| *stop).await.is_ok() });
        lm.shutdown("test");
        assert!(waiter.await.unwrap());
    }
}
