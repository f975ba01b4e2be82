//! 자기 제외 통합 테스트.
//!
//! 활동 추적기가 도는 중에 스냅샷 배치를 실행해도
//! 사용자 탭만 활동으로 기록되는지 확인한다.

mod common;

use common::{agent, eventually, fast_config, snapshot_job};
use std::sync::Arc;
use std::time::Duration;
use webusage_app::dispatcher::{JobDispatcher, JobOutcome, JobRequest};
use webusage_core::models::job::{ApiKind, JobConfig};
use webusage_core::ports::browser_host::BrowserHost;
use webusage_monitor::testing::FakeHost;
use webusage_storage::sqlite::SqliteStorage;

#[tokio::test(start_paused = true)]
async fn batch_tabs_are_not_recorded_as_activity() {
    let mut config = fast_config();
    // 스냅샷 요청 전 대기 동안 추적기가 이벤트를 처리한다
    config.snapshot.settle_delay_ms = 100;
    let host = Arc::new(FakeHost::new());
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let agent = agent(config, host.clone(), store);

    let monitor = JobConfig::new("passive_monitor", ApiKind::Activity);
    let tracker = tokio::spawn(agent.ctx.tracker.clone().run(
        monitor,
        host.subscribe(),
        agent.ctx.shutdown(),
    ));

    let dispatcher = JobDispatcher::with_defaults();
    let job = snapshot_job(&["https://a.com/", "https://b.com/", "https://c.com/"]);
    let outcome = dispatcher
        .dispatch(&agent.ctx, &JobRequest::new(job))
        .await
        .unwrap();
    let JobOutcome::Batch(report) = outcome else {
        panic!("배치 결과 아님: {outcome:?}");
    };
    assert_eq!(report.collected(), 6);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(agent.sink.saved_for(ApiKind::Activity).is_empty());
    assert_eq!(agent.sink.saved_for(ApiKind::PeriodicSnapshots).len(), 6);

    // 사용자 탭은 기록된다
    let window = host.create_window(false).await.unwrap();
    host.create_tab(window.id, "https://user.com/").await.unwrap();
    let sink = agent.sink.clone();
    eventually(move || sink.saved_for(ApiKind::Activity).len() == 1).await;
    let saved = agent.sink.saved_for(ApiKind::Activity);
    assert_eq!(saved[0]["url"], "https://user.com/");

    // 임계값 안의 두 번째 로드는 중복으로 버려진다
    host.create_tab(window.id, "https://user.com/other").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(agent.sink.saved_for(ApiKind::Activity).len(), 1);

    agent.shutdown.send(true).unwrap();
    tracker.await.unwrap();
}
