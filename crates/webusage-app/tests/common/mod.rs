//! 통합 테스트 공용 구성.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use webusage_app::context::{Adapters, OrchestratorContext};
use webusage_core::config::AppConfig;
use webusage_core::error::CoreError;
use webusage_core::models::job::{ApiKind, JobConfig, Target};
use webusage_core::ports::checkpoint_store::CheckpointStore;
use webusage_core::ports::fetcher::TargetSource;
use webusage_monitor::testing::{FakeHost, RecordingSink};
use webusage_network::fetcher::HttpPageFetcher;

pub struct NoRemoteTargets;

#[async_trait]
impl TargetSource for NoRemoteTargets {
    async fn snapshot_targets(&self) -> Result<Vec<String>, CoreError> {
        Ok(Vec::new())
    }
}

/// 에이전트 프로세스 하나 (실행 ID 하나)
pub struct Agent {
    pub ctx: Arc<OrchestratorContext>,
    pub host: Arc<FakeHost>,
    pub sink: Arc<RecordingSink>,
    pub shutdown: Arc<watch::Sender<bool>>,
}

pub fn agent(config: AppConfig, host: Arc<FakeHost>, store: Arc<dyn CheckpointStore>) -> Agent {
    let sink = Arc::new(RecordingSink::default());
    let (tx, rx) = watch::channel(false);
    let adapters = Adapters {
        host: host.clone(),
        notifier: host.clone(),
        checkpoints: store,
        sink: sink.clone(),
        processor: None,
        fetcher: Arc::new(HttpPageFetcher::new(Duration::from_secs(5), 0).unwrap()),
        targets: Arc::new(NoRemoteTargets),
    };
    Agent {
        ctx: Arc::new(OrchestratorContext::new(config, adapters, rx)),
        host,
        sink,
        shutdown: Arc::new(tx),
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

pub fn snapshot_job(urls: &[&str]) -> JobConfig {
    let mut job = JobConfig::new("periodic_snapshots", ApiKind::PeriodicSnapshots);
    job.recollect_interval_days = Some(1.0);
    job.targets = urls.iter().map(|u| Target::url(*u)).collect();
    job
}

/// 조건이 맞을 때까지 대기 (최대 5초)
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("조건 대기 타임아웃");
}
