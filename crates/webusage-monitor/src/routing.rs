//! 수집 결과 라우팅.
//!
//! `html` 필드를 비식별화한 뒤, 작업의 `process` 플래그에 따라
//! 후처리기 또는 저장 서버로 보낸다.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use webusage_core::error::CoreError;
use webusage_core::models::job::{ApiKind, JobConfig};
use webusage_core::ports::redactor::Redactor;
use webusage_core::ports::sink::{PersistenceSink, PostProcessor};

/// 결과 라우터
pub struct PayloadRouter {
    sink: Arc<dyn PersistenceSink>,
    processor: Arc<dyn PostProcessor>,
    redactor: Arc<dyn Redactor>,
}

impl PayloadRouter {
    pub fn new(
        sink: Arc<dyn PersistenceSink>,
        processor: Arc<dyn PostProcessor>,
        redactor: Arc<dyn Redactor>,
    ) -> Self {
        Self {
            sink,
            processor,
            redactor,
        }
    }

    /// 비식별화 후 작업 설정에 맞는 곳으로 전달
    pub async fn route(
        &self,
        job: &JobConfig,
        api: ApiKind,
        url: &str,
        mut payload: Value,
    ) -> Result<(), CoreError> {
        if let Some(Value::String(html)) = payload.get_mut("html") {
            let redacted = self.redactor.redact(url, html);
            *html = redacted;
        }

        if job.process {
            debug!("[{}] 후처리기로 전달: {api}", job.job_id);
            self.processor.process(&job.job_id, api, payload).await
        } else {
            self.sink.save(&job.job_id, api, payload).await
        }
    }

    /// 후처리 없이 저장 서버로 바로 전달
    pub async fn save(&self, job_id: &str, api: ApiKind, payload: Value) -> Result<(), CoreError> {
        self.sink.save(job_id, api, payload).await
    }
}

/// 저장 서버로 그대로 넘기는 후처리기
pub struct PassthroughProcessor {
    sink: Arc<dyn PersistenceSink>,
}

impl PassthroughProcessor {
    pub fn new(sink: Arc<dyn PersistenceSink>) -> Self {
        Self { sink }
    }
}

#[async_trait::async_trait]
impl PostProcessor for PassthroughProcessor {
    async fn process(&self, job_id: &str, api: ApiKind, payload: Value) -> Result<(), CoreError> {
        self.sink.save(job_id, api, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redaction::RuleRedactor;
    use crate::testing::RecordingSink;
    use serde_json::json;
    use webusage_core::config::RedactionRule;

    fn router(sink: Arc<RecordingSink>) -> PayloadRouter {
        let redactor = RuleRedactor::new(vec![RedactionRule {
            domain: "google.com".into(),
            marker: "gb_acct".into(),
        }]);
        PayloadRouter::new(
            sink.clone(),
            Arc::new(PassthroughProcessor::new(sink)),
            Arc::new(redactor),
        )
    }

    #[tokio::test]
    async fn redacts_html_before_saving() {
        let sink = Arc::new(RecordingSink::default());
        let job = JobConfig::new("snap", ApiKind::PeriodicSnapshots);
        router(sink.clone())
            .route(
                &job,
                ApiKind::PeriodicSnapshots,
                "https://www.google.com/search?q=x",
                json!({"html": "<a class=\"gb_acct\">me</a>ok"}),
            )
            .await
            .unwrap();

        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].2["html"], "me</a>ok");
    }

    #[tokio::test]
    async fn process_flag_goes_through_processor() {
        let sink = Arc::new(RecordingSink::default());
        let mut job = JobConfig::new("pm", ApiKind::Activity);
        job.process = true;
        router(sink.clone())
            .route(&job, ApiKind::Activity, "", json!({"url": ""}))
            .await
            .unwrap();
        assert_eq!(sink.saved()[0].0, "pm");
    }
}
