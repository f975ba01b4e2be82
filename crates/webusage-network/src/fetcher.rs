//! 웹사이트 기록 페이지 조회 (`PageFetcher` 구현).

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use webusage_core::error::CoreError;
use webusage_core::ports::fetcher::PageFetcher;

use crate::http_sink::{check_response, execute_with_retry};

/// reqwest 기반 페이지 조회기
///
/// 쿠키 저장소를 쓰지 않는다. 인증이 필요한 페이지는 브라우저 쪽에서 수집한다.
pub struct HttpPageFetcher {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;
        Ok(Self {
            client,
            max_retries,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CoreError> {
        let text = execute_with_retry(self.max_retries, || async {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| CoreError::Network(format!("페이지 요청 실패: {e}")))?;
            let resp = check_response(resp).await?;
            resp.text()
                .await
                .map_err(|e| CoreError::Network(format!("페이지 본문 읽기 실패: {e}")))
        })
        .await?;

        debug!("페이지 조회: {url} ({} bytes)", text.len());
        Ok(text)
    }
}
