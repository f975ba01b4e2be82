//! 시간 창 계산기.
//!
//! 체크포인트 + 작업 설정 + 현재 시각만으로 [`TimeWindow`]를 만드는 순수 함수.
//! 증분 정책은 호출마다 한 칸만 전진한다. 밀린 창은 완료 후 다시 호출해 따라잡는다.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;
use webusage_core::error::CoreError;
use webusage_core::models::checkpoint::Checkpoint;
use webusage_core::models::job::{JobConfig, RecurrencePolicy};
use webusage_core::models::window::TimeWindow;

/// 시간 창 계산
///
/// - `init`: 시작 = `init_date` (재수집 정책에서 없으면 epoch, 즉 "수집 이력 없음")
/// - 그 외: 시작 = 체크포인트 시각
/// - 증분: 끝 = 시작 + step, `now > 끝`이면 실행
/// - 재수집: 끝 = now, `now − 시작 > period`면 실행
pub fn compute_window(
    checkpoint: &Checkpoint,
    job: &JobConfig,
    now: DateTime<Utc>,
) -> Result<TimeWindow, CoreError> {
    let policy = job.recurrence()?;

    let start = if checkpoint.is_init() {
        match (&policy, job.init_date) {
            (_, Some(init_date)) => init_date,
            (RecurrencePolicy::Recollect { .. }, None) => DateTime::<Utc>::UNIX_EPOCH,
            (RecurrencePolicy::Incremental { .. }, None) => {
                return Err(CoreError::Config(format!(
                    "[{}] 증분 정책에 init_date 없음",
                    job.job_id
                )))
            }
        }
    } else {
        checkpoint.timestamp
    };

    let window = match policy {
        RecurrencePolicy::Incremental { step, .. } => {
            let end = start + step;
            TimeWindow {
                start,
                end,
                should_run: now > end,
            }
        }
        RecurrencePolicy::Recollect { period } => TimeWindow {
            start,
            end: now,
            should_run: now - start > period,
        },
    };
    Ok(window)
}

/// 시차 상한 (1년)
const MAX_STAGGER: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// 목록 `position`번째 대상이 열릴 수 있는 가장 이른 시각: `started + latency × (position + 1)`
pub fn stagger_due(started: Instant, latency: Duration, position: usize) -> Instant {
    let steps = u32::try_from(position.saturating_add(1)).unwrap_or(u32::MAX);
    started + latency.saturating_mul(steps).min(MAX_STAGGER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};
    use webusage_core::models::checkpoint::Lease;
    use webusage_core::models::job::ApiKind;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn daily_job() -> JobConfig {
        let mut job = JobConfig::new("browser_history", ApiKind::BrowserHistory);
        job.increment_interval_days = Some(1.0);
        job.init_date = Some(day(0));
        job
    }

    #[test]
    fn day_zero_then_day_one() {
        let job = daily_job();
        let init = Checkpoint::init(day(0));

        let early = compute_window(&init, &job, day(0) + Duration::hours(23)).unwrap();
        assert!(!early.should_run);

        let due = compute_window(&init, &job, day(1) + Duration::hours(1)).unwrap();
        assert!(due.should_run);
        assert_eq!((due.start, due.end), (day(0), day(1)));

        // 완료 체크포인트는 창 끝으로 찍힌다
        let done = Checkpoint::complete(due.end);
        let next = compute_window(&done, &job, day(1) + Duration::hours(1)).unwrap();
        assert_eq!((next.start, next.end), (day(1), day(2)));
        assert!(!next.should_run);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let job = daily_job();
        let checkpoint = Checkpoint::complete(day(3));
        let now = day(10);
        let first = compute_window(&checkpoint, &job, now).unwrap();
        for _ in 0..5 {
            assert_eq!(compute_window(&checkpoint, &job, now).unwrap(), first);
        }
        // 오래 쉬어도 한 칸만 전진
        assert_eq!(first.end - first.start, Duration::days(1));
    }

    #[test]
    fn in_progress_window_starts_at_checkpoint() {
        let job = daily_job();
        let lease = Lease {
            owner: "run-a".into(),
            renewed_at: day(5),
        };
        let checkpoint = Checkpoint::in_progress(day(4), 2, lease);
        let window = compute_window(&checkpoint, &job, day(6)).unwrap();
        assert_eq!(window.start, day(4));
        assert!(window.should_run);
    }

    #[test]
    fn recollect_window_ends_now() {
        let mut job = JobConfig::new("ad_preferences", ApiKind::WebsiteHistory);
        job.recollect_interval_days = Some(7.0);

        let checkpoint = Checkpoint::complete(day(0));
        let not_yet = compute_window(&checkpoint, &job, day(7)).unwrap();
        assert!(!not_yet.should_run);
        assert_eq!(not_yet.end, day(7));

        let due = compute_window(&checkpoint, &job, day(7) + Duration::minutes(1)).unwrap();
        assert!(due.should_run);
    }

    #[test]
    fn recollect_without_init_date_runs_first_time() {
        let mut job = JobConfig::new("periodic_snapshots", ApiKind::PeriodicSnapshots);
        job.recollect_interval_days = Some(1.0);
        let window = compute_window(&Checkpoint::init(day(0)), &job, day(0)).unwrap();
        assert!(window.should_run);
    }

    #[test]
    fn missing_policy_is_config_error() {
        let job = JobConfig::new("broken", ApiKind::BrowserHistory);
        assert_matches!(
            compute_window(&Checkpoint::init(day(0)), &job, day(1)),
            Err(CoreError::Config(_))
        );
    }

    #[test]
    fn incremental_without_init_date_is_config_error() {
        let mut job = daily_job();
        job.init_date = None;
        assert_matches!(
            compute_window(&Checkpoint::init(day(0)), &job, day(1)),
            Err(CoreError::Config(_))
        );
        // 이미 진행된 작업은 체크포인트 시각을 쓴다
        assert!(compute_window(&Checkpoint::complete(day(0)), &job, day(2)).is_ok());
    }

    #[test]
    fn stagger_spaces_targets_by_latency() {
        let started = Instant::now();
        let latency = std::time::Duration::from_secs(10);
        assert_eq!(stagger_due(started, latency, 0) - started, latency);
        assert_eq!(stagger_due(started, latency, 2) - started, latency * 3);
    }

    #[test]
    fn stagger_never_overflows() {
        let started = Instant::now();
        let latency = std::time::Duration::from_millis(u64::MAX);
        assert_eq!(stagger_due(started, latency, usize::MAX) - started, MAX_STAGGER);
        let small = std::time::Duration::from_millis(1);
        let due = stagger_due(started, small, (u32::MAX as usize).saturating_add(10));
        assert_eq!(due - started, small * u32::MAX);
    }
}
