//! `--status`: 작업별 체크포인트 표.

use std::fmt::Write;
use webusage_core::config::AppConfig;
use webusage_core::error::CoreError;
use webusage_core::models::checkpoint::{Checkpoint, CheckpointState};
use webusage_core::ports::checkpoint_store::CheckpointStore;

/// 설정된 작업과 저장된 체크포인트를 합쳐 표로 만든다
pub async fn render(config: &AppConfig, store: &dyn CheckpointStore) -> Result<String, CoreError> {
    let stored = store.list().await?;
    let mut out = String::new();
    let _ = writeln!(out, "{:<22} {:<20} {:<12} {:<8} 시각", "작업", "API", "상태", "재개");

    for job in &config.jobs {
        let checkpoint = stored
            .iter()
            .find(|(id, _)| *id == job.job_id)
            .map(|(_, cp)| cp);
        let _ = writeln!(out, "{}", row(&job.job_id, job.api.as_str(), checkpoint));
    }
    // 설정에서 빠진 작업의 체크포인트도 보여준다
    for (job_id, checkpoint) in &stored {
        if config.job(job_id).is_none() {
            let _ = writeln!(out, "{}", row(job_id, "-", Some(checkpoint)));
        }
    }
    Ok(out)
}

fn row(job_id: &str, api: &str, checkpoint: Option<&Checkpoint>) -> String {
    match checkpoint {
        None => format!("{job_id:<22} {api:<20} {:<12} {:<8} -", "미등록", "-"),
        Some(cp) => {
            let resume = match &cp.state {
                CheckpointState::InProgress { resume_index, .. } => resume_index.to_string(),
                _ => "-".to_string(),
            };
            format!(
                "{job_id:<22} {api:<20} {:<12} {resume:<8} {}",
                cp.state_name(),
                cp.timestamp.to_rfc3339()
            )
        }
    }
}
