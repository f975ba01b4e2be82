//! 단위 테스트용 컨텍스트 구성.

use async_trait::async_trait;
use std::collections::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use webusage_core::config::AppConfig;
use webusage_core::error::CoreError;
use webusage_core::ports::fetcher::{PageFetcher, TargetSource};
use webusage_monitor::testing::{FakeHost, RecordingSink};
use webusage_storage::sqlite::SqliteStorage;

use crate::context::{Adapters, OrchestratorContext};

/// 고정 응답 페이지 조회기. 요청 URL을 기록한다.
#[derive(Default)]
pub struct StaticPages {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl StaticPages {
    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl PageFetcher for StaticPages {
    async fn fetch(&self, url: &str) -> Result<String, CoreError> {
        self.requested.lock().push(url.to_string());
        let base = url.split('?').next().unwrap_or(url);
        self.pages
            .get(base)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                resource_type: "page".into(),
                id: url.into(),
            })
    }
}

/// 고정 스냅샷 대상
#[derive(Default)]
pub struct StaticTargets(pub Vec<String>);

#[async_trait]
impl TargetSource for StaticTargets {
    async fn snapshot_targets(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.0.clone())
    }
}

pub struct Harness {
    pub ctx: Arc<OrchestratorContext>,
    pub host: Arc<FakeHost>,
    pub sink: Arc<RecordingSink>,
    pub pages: Arc<StaticPages>,
    pub shutdown: watch::Sender<bool>,
}

pub fn harness(config: AppConfig) -> Harness {
    harness_with(config, StaticPages::default(), Vec::new())
}

pub fn harness_with(config: AppConfig, pages: StaticPages, targets: Vec<String>) -> Harness {
    let host = Arc::new(FakeHost::new());
    let sink = Arc::new(RecordingSink::default());
    let pages = Arc::new(pages);
    let (shutdown, rx) = watch::channel(false);
    let adapters = Adapters {
        host: host.clone(),
        notifier: host.clone(),
        checkpoints: Arc::new(SqliteStorage::open_in_memory().unwrap()),
        sink: sink.clone(),
        processor: None,
        fetcher: pages.clone(),
        targets: Arc::new(StaticTargets(targets)),
    };
    Harness {
        ctx: Arc::new(OrchestratorContext::new(config, adapters, rx)),
        host,
        sink,
        pages,
        shutdown,
    }
}

/// 대기 시간을 0으로 줄인 설정
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default_config();
    config.snapshot.settle_delay_ms = 0;
    config.activity.settle_delay_ms = 0;
    config.history.catch_up_delay_ms = 0;
    config
}
