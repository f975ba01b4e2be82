//! 외부 웹사이트 기록 수집.
//!
//! `complete`는 대상 페이지를 간격을 두고 모두 받아오고 마지막 대상 후에 완료한다.
//! `incremental`은 창 범위를 `min`/`max` 마이크로초 쿼리로 붙여 받아온다.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use url::Url;
use webusage_core::error::CoreError;
use webusage_core::models::job::{ApiKind, HistoryType, JobConfig, Target};
use webusage_core::models::window::TimeWindow;

use super::{catch_up, WindowCollector};
use crate::context::OrchestratorContext;
use crate::dispatcher::{JobHandler, JobOutcome};
use crate::interval::{compute_window, stagger_due};
use crate::lease::JobLease;

pub struct WebsiteHistoryHandler;

impl WebsiteHistoryHandler {
    async fn collect_complete(
        &self,
        ctx: &OrchestratorContext,
        job: &JobConfig,
    ) -> Result<JobOutcome, CoreError> {
        let job_id = job.job_id.as_str();
        let checkpoint = ctx.checkpoint(job_id).await?;
        let window = compute_window(&checkpoint, job, chrono::Utc::now())?;
        if !window.should_run {
            return Ok(JobOutcome::NotDue);
        }
        let Some(mut lease) = JobLease::acquire(ctx, job_id, &checkpoint, &window).await? else {
            return Ok(JobOutcome::Busy);
        };

        let offset = lease.resume_index().min(job.targets.len());
        let latency = Duration::from_millis(job.batch.item_latency_ms);
        let started = Instant::now();

        for (position, target) in job.targets[offset..].iter().enumerate() {
            let due = stagger_due(started, latency, position);
            if !ctx.pause(due.saturating_duration_since(Instant::now())).await {
                return Ok(JobOutcome::Cancelled);
            }
            if let Err(e) = fetch_and_route(ctx, job, target, &target.url).await {
                warn!("[{job_id}] 대상 건너뜀: {}: {e}", target.url);
            }
            lease.advance(offset + position + 1).await?;
        }

        lease.complete(window.end).await?;
        info!("[{job_id}] 전체 수집 완료: 대상 {}개", job.targets.len());
        Ok(JobOutcome::Collected { windows: 1 })
    }
}

#[async_trait]
impl WindowCollector for WebsiteHistoryHandler {
    async fn collect_window(
        &self,
        ctx: &OrchestratorContext,
        job: &JobConfig,
        window: &TimeWindow,
    ) -> Result<(), CoreError> {
        for target in &job.targets {
            let url = bounded_url(&target.url, window)?;
            fetch_and_route(ctx, job, target, &url).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobHandler for WebsiteHistoryHandler {
    fn api(&self) -> ApiKind {
        ApiKind::WebsiteHistory
    }

    async fn handle(
        &self,
        ctx: &OrchestratorContext,
        job: &JobConfig,
    ) -> Result<JobOutcome, CoreError> {
        match job.history_type {
            Some(HistoryType::Complete) => self.collect_complete(ctx, job).await,
            Some(HistoryType::Incremental) => catch_up(self, ctx, job).await,
            None => Err(CoreError::Config(format!(
                "[{}] history_type 없음: complete 또는 incremental 필요",
                job.job_id
            ))),
        }
    }
}

/// 창 범위를 `min`/`max` 쿼리로 붙인 URL
fn bounded_url(base: &str, window: &TimeWindow) -> Result<String, CoreError> {
    let mut url = Url::parse(base)
        .map_err(|e| CoreError::Config(format!("잘못된 대상 URL {base}: {e}")))?;
    let (min, max) = window.bounds_micros();
    url.query_pairs_mut()
        .append_pair("min", &min.to_string())
        .append_pair("max", &max.to_string());
    Ok(url.into())
}

async fn fetch_and_route(
    ctx: &OrchestratorContext,
    job: &JobConfig,
    target: &Target,
    url: &str,
) -> Result<(), CoreError> {
    let html = ctx.fetcher.fetch(url).await?;
    let data = json!({
        "html": html,
        "url": target.url,
        "name": target.name,
    });
    ctx.router
        .route(job, ApiKind::WebsiteHistory, &target.url, data)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_config, harness, harness_with, StaticPages};
    use assert_matches::assert_matches;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn named(name: &str, url: &str) -> Target {
        Target {
            name: Some(name.into()),
            url: url.into(),
        }
    }

    #[test]
    fn bounded_url_appends_micros() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let window = TimeWindow {
            start,
            end: start + ChronoDuration::days(1),
            should_run: true,
        };
        let url = bounded_url("https://myactivity.google.com/item", &window).unwrap();
        assert_eq!(
            url,
            "https://myactivity.google.com/item?min=1577836800000000&max=1577923200000000"
        );
    }

    #[test]
    fn bounded_url_rejects_garbage() {
        let window = TimeWindow {
            start: Utc::now(),
            end: Utc::now(),
            should_run: true,
        };
        assert_matches!(bounded_url("not a url", &window), Err(CoreError::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn complete_mode_fetches_every_target() {
        let pages = StaticPages::default()
            .with_page("https://o.bluekai.com/registry", "<p>bk</p>")
            .with_page("https://adssettings.google.com/authenticated", "<p>ads</p>");
        let h = harness_with(fast_config(), pages, Vec::new());

        let mut job = JobConfig::new("ad_preferences", ApiKind::WebsiteHistory);
        job.history_type = Some(HistoryType::Complete);
        job.recollect_interval_days = Some(7.0);
        job.batch.item_latency_ms = 5_000;
        job.targets = vec![
            named("bluekai", "https://o.bluekai.com/registry"),
            named("google_ads", "https://adssettings.google.com/authenticated"),
        ];

        let before = Instant::now();
        let outcome = WebsiteHistoryHandler.handle(&h.ctx, &job).await.unwrap();
        assert_eq!(outcome, JobOutcome::Collected { windows: 1 });
        assert_eq!(before.elapsed().as_secs(), 10);

        let saved = h.sink.saved_for(ApiKind::WebsiteHistory);
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0]["name"], "bluekai");
        assert_eq!(saved[0]["html"], "<p>bk</p>");
        assert_eq!(saved[1]["url"], "https://adssettings.google.com/authenticated");
        assert!(h
            .ctx
            .checkpoints
            .get("ad_preferences")
            .await
            .unwrap()
            .unwrap()
            .is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn complete_mode_skips_failed_target() {
        let pages = StaticPages::default().with_page("https://ok.com/", "ok");
        let h = harness_with(fast_config(), pages, Vec::new());

        let mut job = JobConfig::new("sites", ApiKind::WebsiteHistory);
        job.history_type = Some(HistoryType::Complete);
        job.recollect_interval_days = Some(7.0);
        job.targets = vec![named("gone", "https://gone.com/"), named("ok", "https://ok.com/")];

        WebsiteHistoryHandler.handle(&h.ctx, &job).await.unwrap();
        assert_eq!(h.sink.saved_for(ApiKind::WebsiteHistory).len(), 1);
        assert_eq!(h.pages.requested().len(), 2);
    }

    #[tokio::test]
    async fn incremental_mode_sends_window_bounds() {
        let pages =
            StaticPages::default().with_page("https://myactivity.google.com/item", "<p>a</p>");
        let h = harness_with(fast_config(), pages, Vec::new());

        let mut job = JobConfig::new("google_activity", ApiKind::WebsiteHistory);
        job.history_type = Some(HistoryType::Incremental);
        job.increment_interval_days = Some(1.0);
        job.init_date = Some(Utc::now() - ChronoDuration::hours(30));
        job.targets = vec![named("google_activity", "https://myactivity.google.com/item")];

        let outcome = WebsiteHistoryHandler.handle(&h.ctx, &job).await.unwrap();
        assert_eq!(outcome, JobOutcome::Collected { windows: 1 });

        let requested = h.pages.requested();
        assert_eq!(requested.len(), 1);
        assert!(requested[0].starts_with("https://myactivity.google.com/item?min="));
        assert!(requested[0].contains("&max="));
    }

    #[tokio::test]
    async fn missing_history_type_is_config_error() {
        let h = harness(fast_config());
        let mut job = JobConfig::new("sites", ApiKind::WebsiteHistory);
        job.recollect_interval_days = Some(1.0);
        assert_matches!(
            WebsiteHistoryHandler.handle(&h.ctx, &job).await,
            Err(CoreError::Config(_))
        );
    }
}
