//! 수집 작업(job) 설정 모델.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// 작업이 호출하는 수집 API 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKind {
    /// 브라우저 방문 기록
    BrowserHistory,
    /// 외부 웹사이트 기록 페이지 (광고 설정, 계정 활동 등)
    WebsiteHistory,
    /// 탭 활성화/로드 활동 스트림
    Activity,
    /// 주기적 스냅샷 배치
    PeriodicSnapshots,
}

impl ApiKind {
    /// 서버 envelope에 쓰이는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrowserHistory => "browser_history",
            Self::WebsiteHistory => "website_history",
            Self::Activity => "activity",
            Self::PeriodicSnapshots => "periodic_snapshots",
        }
    }
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 웹사이트 기록 수집 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryType {
    /// 페이지 전체를 한 번에 수집
    Complete,
    /// 시간 창 단위로 `min`/`max` 쿼리를 붙여 수집
    Incremental,
}

/// 수집 대상 URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// 표시 이름 (예: "google_ads")
    #[serde(default)]
    pub name: Option<String>,
    /// 대상 URL
    pub url: String,
}

impl Target {
    /// 이름 없는 대상 생성
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            name: None,
            url: url.into(),
        }
    }
}

/// 배치 타이밍
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchTiming {
    /// 대상 간 시차 (밀리초). n번째 대상은 `latency × (n + 1)` 이후 시작
    #[serde(default = "default_item_latency_ms")]
    pub item_latency_ms: u64,
    /// 알림 후 배치 시작까지 대기 (밀리초)
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,
}

impl Default for BatchTiming {
    fn default() -> Self {
        Self {
            item_latency_ms: default_item_latency_ms(),
            start_delay_ms: default_start_delay_ms(),
        }
    }
}

fn default_item_latency_ms() -> u64 {
    10_000
}

fn default_start_delay_ms() -> u64 {
    60_000
}

fn default_max_results() -> u32 {
    100_000
}

/// 반복 정책: [`JobConfig::recurrence`]가 설정 필드에서 도출한다.
#[derive(Debug, Clone, PartialEq)]
pub enum RecurrencePolicy {
    /// 초기 날짜부터 `step` 단위로 한 칸씩 전진
    Incremental {
        /// 한 번에 처리하는 시간 창 크기
        step: Duration,
        /// 체크포인트가 init일 때의 시작 시각
        init_date: Option<DateTime<Utc>>,
    },
    /// 마지막 수집 이후 `period`가 지나면 전체 재수집
    Recollect {
        /// 재수집 주기
        period: Duration,
    },
}

/// 작업 설정 (불변)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// 작업 식별자 (체크포인트 키)
    pub job_id: String,
    /// 호출할 API
    pub api: ApiKind,
    /// 대상 URL 목록
    #[serde(default)]
    pub targets: Vec<Target>,
    /// 도메인 필터 (부분 문자열 일치, 비어 있으면 전체)
    #[serde(default)]
    pub domains: Vec<String>,
    /// 재수집 주기 (일)
    #[serde(default)]
    pub recollect_interval_days: Option<f64>,
    /// 증분 크기 (일)
    #[serde(default)]
    pub increment_interval_days: Option<f64>,
    /// 증분 수집 시작 시각
    #[serde(default)]
    pub init_date: Option<DateTime<Utc>>,
    /// 배치 타이밍
    #[serde(default)]
    pub batch: BatchTiming,
    /// true면 결과를 후처리기로 보내고, false면 저장 서버로 바로 보낸다
    #[serde(default)]
    pub process: bool,
    /// 방문 기록 검색어
    #[serde(default)]
    pub search: String,
    /// 방문 기록 최대 결과 수
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// 웹사이트 기록 수집 방식
    #[serde(default)]
    pub history_type: Option<HistoryType>,
    /// 스냅샷 대상을 서버에서 받아올지 여부
    #[serde(default)]
    pub remote_targets: bool,
}

impl JobConfig {
    /// 기본값으로 채운 작업 설정
    pub fn new(job_id: impl Into<String>, api: ApiKind) -> Self {
        Self {
            job_id: job_id.into(),
            api,
            targets: Vec::new(),
            domains: Vec::new(),
            recollect_interval_days: None,
            increment_interval_days: None,
            init_date: None,
            batch: BatchTiming::default(),
            process: false,
            search: String::new(),
            max_results: default_max_results(),
            history_type: None,
            remote_targets: false,
        }
    }

    /// 설정된 반복 정책 도출
    ///
    /// 증분 설정이 재수집 설정보다 우선한다. 둘 다 없으면 설정 에러.
    pub fn recurrence(&self) -> Result<RecurrencePolicy, CoreError> {
        if let Some(days) = self.increment_interval_days {
            return Ok(RecurrencePolicy::Incremental {
                step: days_to_duration(&self.job_id, "increment_interval_days", days)?,
                init_date: self.init_date,
            });
        }
        if let Some(days) = self.recollect_interval_days {
            return Ok(RecurrencePolicy::Recollect {
                period: days_to_duration(&self.job_id, "recollect_interval_days", days)?,
            });
        }
        Err(CoreError::Config(format!(
            "[{}] 반복 정책 없음: increment_interval_days 또는 recollect_interval_days 필요",
            self.job_id
        )))
    }

    /// 도메인 필터 일치 여부
    pub fn matches_domain(&self, url: &str) -> bool {
        self.domains.is_empty() || self.domains.iter().any(|d| url.contains(d.as_str()))
    }
}

fn days_to_duration(job_id: &str, field: &str, days: f64) -> Result<Duration, CoreError> {
    if !days.is_finite() || days <= 0.0 {
        return Err(CoreError::Validation {
            field: format!("{job_id}.{field}"),
            message: format!("양수여야 함: {days}"),
        });
    }
    Ok(Duration::milliseconds((days * 86_400_000.0).round() as i64))
}
