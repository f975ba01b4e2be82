//! 스냅샷 배치 재개 통합 테스트.
//!
//! 파일 DB를 공유하는 두 프로세스(실행 ID)를 차례로 띄워,
//! 중단된 배치가 남은 대상부터 이어지는지 확인한다.

mod common;

use common::{agent, fast_config, snapshot_job};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use webusage_app::dispatcher::{JobDispatcher, JobOutcome, JobRequest};
use webusage_core::ports::checkpoint_store::CheckpointStore;
use webusage_monitor::testing::FakeHost;
use webusage_storage::sqlite::SqliteStorage;

const TARGETS: [&str; 5] = [
    "https://a.com/",
    "https://b.com/",
    "https://c.com/",
    "https://d.com/",
    "https://e.com/",
];

#[tokio::test(start_paused = true)]
async fn interrupted_batch_resumes_at_next_target() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("checkpoints.db");
    let job = snapshot_job(&TARGETS);
    let dispatcher = JobDispatcher::with_defaults();

    // 첫 프로세스: 2개 처리 후 종료 신호
    {
        let host = Arc::new(FakeHost::new());
        host.set_private_allowed(false);
        let store = Arc::new(SqliteStorage::open(&db_path).unwrap());
        let first = agent(fast_config(), host.clone(), store);

        let answered = Arc::new(AtomicUsize::new(0));
        let shutdown = first.shutdown.clone();
        let counter = answered.clone();
        host.set_responder(move |tab, _| {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                let _ = shutdown.send(true);
            }
            Some(json!({"html": "<p>", "tab_info": {"context_tab_pair": tab.wintab(), "url": tab.url}}))
        });

        let outcome = dispatcher
            .dispatch(&first.ctx, &JobRequest::new(job.clone()))
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Cancelled);
        assert_eq!(first.sink.saved().len(), 2);

        let cp = first.ctx.checkpoints.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(cp.state_name(), "in_progress");
        assert_eq!(cp.resume_index(), Some(2));
    }

    // 두 번째 프로세스: 남은 3개만 처리
    let host = Arc::new(FakeHost::new());
    host.set_private_allowed(false);
    let store = Arc::new(SqliteStorage::open(&db_path).unwrap());
    let second = agent(fast_config(), host.clone(), store.clone());

    let outcome = dispatcher
        .dispatch(&second.ctx, &JobRequest::new(job.clone()))
        .await
        .unwrap();
    let JobOutcome::Batch(report) = outcome else {
        panic!("배치 결과 아님: {outcome:?}");
    };
    assert_eq!(report.resumed_from, 2);

    let opened: Vec<String> = host.created_tabs().into_iter().map(|t| t.url).collect();
    assert_eq!(opened, TARGETS[2..].iter().map(|u| u.to_string()).collect::<Vec<_>>());
    assert!(store.get(&job.job_id).await.unwrap().unwrap().is_complete());
}

#[tokio::test(start_paused = true)]
async fn completed_batch_is_not_repeated_within_period() {
    let host = Arc::new(FakeHost::new());
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let agent = agent(fast_config(), host.clone(), store);
    let dispatcher = JobDispatcher::with_defaults();
    let job = snapshot_job(&TARGETS[..2]);

    let first = dispatcher
        .dispatch(&agent.ctx, &JobRequest::new(job.clone()))
        .await
        .unwrap();
    assert!(matches!(first, JobOutcome::Batch(_)));
    let opened = host.created_tabs().len();

    let second = dispatcher
        .dispatch(&agent.ctx, &JobRequest::new(job))
        .await
        .unwrap();
    assert_eq!(second, JobOutcome::NotDue);
    assert_eq!(host.created_tabs().len(), opened);
}
