//! 애플리케이션 설정 구조체.
//!
//! 서버 URL, 저장소 경로, 스냅샷/활동 타이밍, 만료, 비식별화 규칙, 작업 목록 등
//! 런타임 설정을 정의한다. [`crate::config_manager::ConfigManager`]가 JSON 파일로 로드/저장한다.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::job::{ApiKind, BatchTiming, HistoryType, JobConfig, Target};

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 저장 서버 연결 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 연구 참여자 식별 정보
    #[serde(default)]
    pub identity: IdentityConfig,
    /// 로컬 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 작업 재실행 주기
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// 스냅샷 배치 설정
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    /// 활동 추적 설정
    #[serde(default)]
    pub activity: ActivityConfig,
    /// 방문/웹사이트 기록 수집 설정
    #[serde(default)]
    pub history: HistoryConfig,
    /// 자동 만료 설정
    #[serde(default)]
    pub expiration: ExpirationConfig,
    /// 비식별화 규칙
    #[serde(default)]
    pub redaction: RedactionConfig,
    /// 수집 작업 목록
    #[serde(default = "default_jobs")]
    pub jobs: Vec<JobConfig>,
}

impl AppConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            identity: IdentityConfig::default(),
            storage: StorageConfig::default(),
            schedule: ScheduleConfig::default(),
            snapshot: SnapshotConfig::default(),
            activity: ActivityConfig::default(),
            history: HistoryConfig::default(),
            expiration: ExpirationConfig::default(),
            redaction: RedactionConfig::default(),
            jobs: default_jobs(),
        }
    }

    /// 작업 ID로 설정 조회
    pub fn job(&self, job_id: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|job| job.job_id == job_id)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

// ============================================================
// 서버
// ============================================================

/// 저장 서버 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 서버 기본 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 일시적 실패 재시도 횟수
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://webusage.xyz".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

// ============================================================
// 식별 정보
// ============================================================

/// 연구 참여자 식별 정보
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// 첫 실행 시 생성되는 사용자 ID
    #[serde(default)]
    pub user_id: Option<String>,
}

// ============================================================
// 저장소
// ============================================================

/// 로컬 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 데이터 디렉토리 (없으면 플랫폼 기본 경로)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// 체크포인트 DB 파일 이름
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            db_file: default_db_file(),
        }
    }
}

fn default_db_file() -> String {
    "checkpoints.db".to_string()
}

// ============================================================
// 재실행 주기
// ============================================================

/// 작업 재실행 주기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// 전체 작업을 다시 점검하는 주기 (분)
    #[serde(default = "default_redispatch_interval_mins")]
    pub redispatch_interval_mins: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            redispatch_interval_mins: default_redispatch_interval_mins(),
        }
    }
}

impl ScheduleConfig {
    pub fn redispatch_interval(&self) -> Duration {
        Duration::from_secs(self.redispatch_interval_mins * 60)
    }
}

fn default_redispatch_interval_mins() -> u64 {
    60
}

// ============================================================
// 스냅샷
// ============================================================

/// 스냅샷 배치 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// 로드 완료 후 스냅샷 요청까지 대기 (밀리초)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// 탭 로드 완료 대기 한도 (밀리초)
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// 페이지 스크립트 응답 대기 한도 (밀리초)
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// 갱신되지 않은 lease를 회수하기까지의 시간 (초)
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    /// 자동 방문 기록 보정 기대값 유지 시간 (초)
    #[serde(default = "default_compensation_ttl_secs")]
    pub compensation_ttl_secs: u64,
    /// 배치 창의 루트 탭이 여는 서버 경로
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
    /// 배치 시작 전 알림 제목
    #[serde(default = "default_notice_title")]
    pub notice_title: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            load_timeout_ms: default_load_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            lease_ttl_secs: default_lease_ttl_secs(),
            compensation_ttl_secs: default_compensation_ttl_secs(),
            landing_path: default_landing_path(),
            notice_title: default_notice_title(),
        }
    }
}

impl SnapshotConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn compensation_ttl(&self) -> Duration {
        Duration::from_secs(self.compensation_ttl_secs)
    }

    pub fn lease_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_ttl_secs as i64)
    }
}

fn default_settle_delay_ms() -> u64 {
    4_000
}

fn default_load_timeout_ms() -> u64 {
    60_000
}

fn default_response_timeout_ms() -> u64 {
    30_000
}

fn default_lease_ttl_secs() -> u64 {
    3_600
}

fn default_compensation_ttl_secs() -> u64 {
    300
}

fn default_landing_path() -> String {
    "/taking_snapshots".to_string()
}

fn default_notice_title() -> String {
    "WebUsage".to_string()
}

// ============================================================
// 활동 추적
// ============================================================

/// 활동 추적 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// 연속 로드 이벤트를 중복으로 보는 임계값 (밀리초)
    #[serde(default = "default_threshold_ms")]
    pub threshold_ms: i64,
    /// 로드 완료 후 페이로드 요청까지 대기 (밀리초)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            threshold_ms: default_threshold_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl ActivityConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_threshold_ms() -> i64 {
    1_000
}

// ============================================================
// 방문/웹사이트 기록
// ============================================================

/// 기록 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// 증분 수집에서 다음 시간 창까지 쉬는 시간 (밀리초)
    #[serde(default = "default_catch_up_delay_ms")]
    pub catch_up_delay_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            catch_up_delay_ms: default_catch_up_delay_ms(),
        }
    }
}

impl HistoryConfig {
    pub fn catch_up_delay(&self) -> Duration {
        Duration::from_millis(self.catch_up_delay_ms)
    }
}

fn default_catch_up_delay_ms() -> u64 {
    5_000
}

// ============================================================
// 만료
// ============================================================

/// 자동 만료 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirationConfig {
    /// 연구 종료 시각. 지나면 shim 제거 후 종료
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// 만료 확인 주기 (시간)
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u64,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            expires_at: None,
            check_interval_hours: default_check_interval_hours(),
        }
    }
}

impl ExpirationConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_hours * 3600)
    }
}

fn default_check_interval_hours() -> u64 {
    12
}

// ============================================================
// 비식별화
// ============================================================

/// 도메인별 제거 규칙. `marker`를 포함한 태그를 통째로 지운다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionRule {
    /// URL 부분 문자열
    pub domain: String,
    /// 태그 안에서 찾을 문자열 (예: 클래스 이름)
    pub marker: String,
}

/// 비식별화 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactionConfig {
    #[serde(default)]
    pub rules: Vec<RedactionRule>,
}

// ============================================================
// 기본 작업
// ============================================================

fn study_date(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).single()
}

/// 기본 수집 작업 목록
pub fn default_jobs() -> Vec<JobConfig> {
    let mut browser_history = JobConfig::new("browser_history", ApiKind::BrowserHistory);
    browser_history.increment_interval_days = Some(10.0);
    browser_history.init_date = study_date(2020, 1, 1);

    let mut passive_monitor = JobConfig::new("passive_monitor", ApiKind::Activity);
    passive_monitor.domains = [
        "youtube.com",
        "google.com/search",
        "facebook.com",
        "news.google.com",
        "twitter.com/home",
        "twitter.com/search",
        "twitter.com/explore",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect();

    let mut periodic_snapshots = JobConfig::new("periodic_snapshots", ApiKind::PeriodicSnapshots);
    periodic_snapshots.recollect_interval_days = Some(1.0);
    periodic_snapshots.remote_targets = true;
    periodic_snapshots.batch = BatchTiming {
        item_latency_ms: 10_000,
        start_delay_ms: 60_000,
    };

    let mut google_activity = JobConfig::new("google_activity", ApiKind::WebsiteHistory);
    google_activity.history_type = Some(HistoryType::Incremental);
    google_activity.targets = vec![Target {
        name: Some("google_activity".into()),
        url: "https://myactivity.google.com/item".into(),
    }];
    google_activity.increment_interval_days = Some(1.0);
    google_activity.init_date = study_date(2020, 1, 1);

    let mut ad_preferences = JobConfig::new("ad_preferences", ApiKind::WebsiteHistory);
    ad_preferences.history_type = Some(HistoryType::Complete);
    ad_preferences.targets = vec![
        Target {
            name: Some("bluekai".into()),
            url: "https://o.bluekai.com/registry".into(),
        },
        Target {
            name: Some("google_ads".into()),
            url: "https://adssettings.google.com/authenticated".into(),
        },
    ];
    ad_preferences.recollect_interval_days = Some(7.0);
    ad_preferences.batch.item_latency_ms = 5_000;
    ad_preferences.init_date = study_date(2019, 4, 1);

    vec![
        browser_history,
        passive_monitor,
        periodic_snapshots,
        google_activity,
        ad_preferences,
    ]
}
