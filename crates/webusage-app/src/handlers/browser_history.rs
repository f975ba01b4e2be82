//! 브라우저 방문 기록 수집.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use webusage_core::error::CoreError;
use webusage_core::models::host::HistoryQuery;
use webusage_core::models::job::{ApiKind, JobConfig};
use webusage_core::models::window::TimeWindow;

use super::{catch_up, WindowCollector};
use crate::context::OrchestratorContext;
use crate::dispatcher::{JobHandler, JobOutcome};

/// 창 범위 방문 기록을 검색해 도메인으로 거르고, URL별 방문 목록을 붙여 보낸다.
pub struct BrowserHistoryHandler;

#[async_trait]
impl WindowCollector for BrowserHistoryHandler {
    async fn collect_window(
        &self,
        ctx: &OrchestratorContext,
        job: &JobConfig,
        window: &TimeWindow,
    ) -> Result<(), CoreError> {
        let query = HistoryQuery {
            text: job.search.clone(),
            start_time_ms: window.start.timestamp_millis(),
            end_time_ms: window.end.timestamp_millis(),
            max_results: job.max_results,
        };
        let items = ctx.host.search_history(&query).await?;
        let found = items.len();

        let mut results = Vec::new();
        for item in items.into_iter().filter(|i| job.matches_domain(&i.url)) {
            let visits = ctx.host.get_visits(&item.url).await?;
            let mut entry = serde_json::to_value(&item)?;
            if let Value::Object(map) = &mut entry {
                map.insert("visits".to_string(), json!(visits));
            }
            results.push(entry);
        }
        debug!(
            "[{}] 방문 기록 {found}건 중 {}건 일치",
            job.job_id,
            results.len()
        );

        if results.is_empty() {
            return Ok(());
        }
        ctx.router
            .route(job, ApiKind::BrowserHistory, "", Value::Array(results))
            .await
    }
}

#[async_trait]
impl JobHandler for BrowserHistoryHandler {
    fn api(&self) -> ApiKind {
        ApiKind::BrowserHistory
    }

    async fn handle(
        &self,
        ctx: &OrchestratorContext,
        job: &JobConfig,
    ) -> Result<JobOutcome, CoreError> {
        catch_up(self, ctx, job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_config, harness};
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};
    use webusage_core::models::checkpoint::Checkpoint;

    fn job(init: chrono::DateTime<Utc>) -> JobConfig {
        let mut job = JobConfig::new("browser_history", ApiKind::BrowserHistory);
        job.increment_interval_days = Some(1.0);
        job.init_date = Some(init);
        job
    }

    #[tokio::test]
    async fn catches_up_every_due_window() {
        let h = harness(fast_config());
        let init = Utc::now() - Duration::hours(60);
        let first = (init + Duration::hours(1)).timestamp_millis() as f64;
        let second = (init + Duration::hours(30)).timestamp_millis() as f64;
        h.host.add_history("https://news.com/a", first);
        h.host.add_history("https://news.com/b", second);

        let outcome = BrowserHistoryHandler.handle(&h.ctx, &job(init)).await.unwrap();
        assert_eq!(outcome, JobOutcome::Collected { windows: 2 });

        let saved = h.sink.saved_for(ApiKind::BrowserHistory);
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0][0]["url"], "https://news.com/a");
        assert_eq!(saved[0][0]["visits"][0]["visit_time"], first);
        assert_eq!(saved[1][0]["url"], "https://news.com/b");

        let cp = h.ctx.checkpoints.get("browser_history").await.unwrap().unwrap();
        assert_eq!(cp, Checkpoint::complete(init + Duration::days(2)));
    }

    #[tokio::test]
    async fn domain_filter_applies() {
        let h = harness(fast_config());
        let init = Utc::now() - Duration::hours(30);
        let t = (init + Duration::hours(1)).timestamp_millis() as f64;
        h.host.add_history("https://youtube.com/watch", t);
        h.host.add_history("https://bank.com/login", t + 1.0);

        let mut job = job(init);
        job.domains = vec!["youtube.com".into()];
        BrowserHistoryHandler.handle(&h.ctx, &job).await.unwrap();

        let saved = h.sink.saved_for(ApiKind::BrowserHistory);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].as_array().unwrap().len(), 1);
        assert_eq!(saved[0][0]["url"], "https://youtube.com/watch");
    }

    #[tokio::test]
    async fn empty_window_still_completes() {
        let h = harness(fast_config());
        let init = Utc::now() - Duration::hours(30);
        let outcome = BrowserHistoryHandler.handle(&h.ctx, &job(init)).await.unwrap();
        assert_eq!(outcome, JobOutcome::Collected { windows: 1 });
        assert!(h.sink.saved().is_empty());
    }

    #[tokio::test]
    async fn not_due_before_first_step() {
        let h = harness(fast_config());
        let init = Utc::now() - Duration::hours(2);
        let outcome = BrowserHistoryHandler.handle(&h.ctx, &job(init)).await.unwrap();
        assert_eq!(outcome, JobOutcome::NotDue);
    }

    #[tokio::test]
    async fn failed_save_restores_checkpoint() {
        let h = harness(fast_config());
        let init = Utc::now() - Duration::hours(30);
        h.host
            .add_history("https://news.com/a", (init + Duration::hours(1)).timestamp_millis() as f64);
        let before = Checkpoint::init(init);
        h.ctx.checkpoints.set("browser_history", &before).await.unwrap();
        h.sink.fail_all(true);

        let result = BrowserHistoryHandler.handle(&h.ctx, &job(init)).await;
        assert_matches!(result, Err(CoreError::Rejected(_)));
        assert_eq!(
            h.ctx.checkpoints.get("browser_history").await.unwrap(),
            Some(before)
        );
    }
}
