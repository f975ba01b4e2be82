//! HTTP 저장 서버 클라이언트.
//!
//! `PersistenceSink` / `TargetSource` 포트 구현. 모든 결과는
//! `{user_id, worker_id, timestamp, version, api, data}` 봉투에 담아
//! `POST {server}/save_data`로 보낸다. 일시적 실패는 재시도한다.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use webusage_core::error::CoreError;
use webusage_core::models::job::ApiKind;
use webusage_core::ports::fetcher::TargetSource;
use webusage_core::ports::sink::PersistenceSink;

/// 기본 재시도 횟수
const DEFAULT_MAX_RETRIES: u32 = 3;

/// 재시도 대기 상한
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// 대상 목록 요청 키
const TERMS_REQUEST_KEY: &str = "send_me_the_terms";

/// 재시도 가능한 에러인지 판별
pub(crate) fn is_retryable(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::Network(_) | CoreError::ServiceUnavailable(_) | CoreError::RateLimit { .. }
    )
}

/// 응답 상태 코드 확인 및 에러 매핑
pub(crate) async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let text = resp.text().await.unwrap_or_else(|e| {
        warn!("응답 본문 읽기 실패: {e}");
        String::new()
    });

    match status.as_u16() {
        404 => Err(CoreError::NotFound {
            resource_type: "API".to_string(),
            id: text,
        }),
        429 => Err(CoreError::RateLimit {
            retry_after_secs: retry_after.unwrap_or(60),
        }),
        502..=504 => Err(CoreError::ServiceUnavailable(text)),
        _ => Err(CoreError::Internal(format!("API 에러 ({status}): {text}"))),
    }
}

/// 재시도가 포함된 요청 실행
///
/// exponential backoff: 1s → 2s → 4s … (최대 30s)
pub(crate) async fn execute_with_retry<F, Fut, T>(
    max_retries: u32,
    operation: F,
) -> Result<T, CoreError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, CoreError>>,
{
    let mut delay = Duration::from_secs(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !is_retryable(&e) || attempt >= max_retries => return Err(e),
            Err(e) => {
                warn!(
                    "요청 실패 (시도 {}/{}): {e}, {delay:?} 후 재시도",
                    attempt + 1,
                    max_retries + 1
                );
                if let CoreError::RateLimit { retry_after_secs } = &e {
                    delay = Duration::from_secs(*retry_after_secs);
                }
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_BACKOFF);
                attempt += 1;
            }
        }
    }
}

/// `save_data` 요청 본문
#[derive(Debug, Serialize)]
struct SaveEnvelope<'a> {
    user_id: &'a str,
    worker_id: &'a str,
    timestamp: String,
    version: &'static str,
    api: ApiKind,
    data: &'a Value,
}

/// 저장 서버 클라이언트
pub struct HttpDataSink {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
    max_retries: u32,
}

impl HttpDataSink {
    /// 새 저장 서버 클라이언트 생성
    pub fn new(base_url: &str, user_id: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// 재시도 횟수 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn post_json(&self, path: &str, body: &impl Serialize) -> Result<Value, CoreError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("{path} 요청 실패: {e}")))?;

        let resp = check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| CoreError::Rejected(format!("{path} 응답 파싱 실패: {e}")))
    }
}

#[async_trait]
impl PersistenceSink for HttpDataSink {
    async fn save(&self, job_id: &str, api: ApiKind, payload: Value) -> Result<(), CoreError> {
        let envelope = SaveEnvelope {
            user_id: &self.user_id,
            worker_id: job_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            api,
            data: &payload,
        };

        let body = execute_with_retry(self.max_retries, || self.post_json("/save_data", &envelope))
            .await?;

        if body.get("success").is_some() {
            debug!("[{job_id}] 저장 완료: {api}");
            Ok(())
        } else {
            Err(CoreError::Rejected(format!("[{job_id}] {body}")))
        }
    }
}

#[async_trait]
impl TargetSource for HttpDataSink {
    async fn snapshot_targets(&self) -> Result<Vec<String>, CoreError> {
        let request = serde_json::json!({ "request_key": TERMS_REQUEST_KEY });
        let body = execute_with_retry(self.max_retries, || {
            self.post_json("/update_search_terms", &request)
        })
        .await?;

        let targets: Vec<String> = serde_json::from_value(body)?;
        debug!("스냅샷 대상 {}개 수신", targets.len());
        Ok(targets)
    }
}
