//! 체크포인트 스토리지 (CheckpointStore 포트 구현).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;
use webusage_core::error::CoreError;
use webusage_core::models::checkpoint::{Checkpoint, CheckpointState, Lease};
use webusage_core::ports::checkpoint_store::CheckpointStore;

use super::SqliteStorage;

/// DB 행 원본
struct CheckpointRow {
    state: String,
    timestamp: String,
    resume_index: Option<i64>,
    lease_owner: Option<String>,
    lease_renewed_at: Option<String>,
}

impl CheckpointRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            state: row.get("state")?,
            timestamp: row.get("timestamp")?,
            resume_index: row.get("resume_index")?,
            lease_owner: row.get("lease_owner")?,
            lease_renewed_at: row.get("lease_renewed_at")?,
        })
    }

    fn into_checkpoint(self, job_id: &str) -> Result<Checkpoint, CoreError> {
        let timestamp = parse_time(job_id, &self.timestamp)?;
        let state = match self.state.as_str() {
            "init" => CheckpointState::Init,
            "complete" => CheckpointState::Complete,
            "in_progress" => {
                let resume_index = self.resume_index.unwrap_or(0).max(0) as usize;
                let renewed_at = match self.lease_renewed_at.as_deref() {
                    Some(raw) => parse_time(job_id, raw)?,
                    None => timestamp,
                };
                CheckpointState::InProgress {
                    resume_index,
                    lease: Lease {
                        owner: self.lease_owner.unwrap_or_default(),
                        renewed_at,
                    },
                }
            }
            other => {
                return Err(CoreError::Internal(format!(
                    "[{job_id}] 알 수 없는 체크포인트 상태: {other}"
                )))
            }
        };
        Ok(Checkpoint { state, timestamp })
    }
}

fn parse_time(job_id: &str, raw: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoreError::Internal(format!("[{job_id}] 시각 파싱 실패 ({raw}): {e}")))
}

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn get(&self, job_id: &str) -> Result<Option<Checkpoint>, CoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT state, timestamp, resume_index, lease_owner, lease_renewed_at
                 FROM checkpoints WHERE job_id = ?1",
                params![job_id],
                CheckpointRow::from_row,
            )
            .optional()
            .map_err(|e| CoreError::Internal(format!("체크포인트 조회 실패: {e}")))?;

        row.map(|r| r.into_checkpoint(job_id)).transpose()
    }

    async fn set(&self, job_id: &str, checkpoint: &Checkpoint) -> Result<(), CoreError> {
        let (resume_index, lease_owner, lease_renewed_at) = match &checkpoint.state {
            CheckpointState::InProgress {
                resume_index,
                lease,
            } => (
                Some(*resume_index as i64),
                Some(lease.owner.clone()),
                Some(lease.renewed_at.to_rfc3339()),
            ),
            _ => (None, None, None),
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO checkpoints
                (job_id, state, timestamp, resume_index, lease_owner, lease_renewed_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
             ON CONFLICT(job_id) DO UPDATE SET
                state = excluded.state,
                timestamp = excluded.timestamp,
                resume_index = excluded.resume_index,
                lease_owner = excluded.lease_owner,
                lease_renewed_at = excluded.lease_renewed_at,
                updated_at = excluded.updated_at",
            params![
                job_id,
                checkpoint.state_name(),
                checkpoint.timestamp.to_rfc3339(),
                resume_index,
                lease_owner,
                lease_renewed_at,
            ],
        )
        .map_err(|e| CoreError::Internal(format!("체크포인트 저장 실패: {e}")))?;

        debug!(
            "[{job_id}] 체크포인트 저장: state={}, resume_index={:?}",
            checkpoint.state_name(),
            resume_index
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(String, Checkpoint)>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT job_id, state, timestamp, resume_index, lease_owner, lease_renewed_at
                 FROM checkpoints ORDER BY job_id",
            )
            .map_err(|e| CoreError::Internal(format!("체크포인트 목록 쿼리 준비 실패: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let job_id: String = row.get("job_id")?;
                Ok((job_id, CheckpointRow::from_row(row)?))
            })
            .map_err(|e| CoreError::Internal(format!("체크포인트 목록 조회 실패: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            let (job_id, raw) =
                row.map_err(|e| CoreError::Internal(format!("체크포인트 행 읽기 실패: {e}")))?;
            let checkpoint = raw.into_checkpoint(&job_id)?;
            result.push((job_id, checkpoint));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn lease(owner: &str, at: DateTime<Utc>) -> Lease {
        Lease {
            owner: owner.to_string(),
            renewed_at: at,
        }
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_get_in_progress() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = Utc::now();
        let cp = Checkpoint::in_progress(now, 3, lease("run-1", now));
        storage.set("periodic_snapshots", &cp).await.unwrap();

        let loaded = storage.get("periodic_snapshots").await.unwrap().unwrap();
        assert_eq!(loaded, cp);
        assert_eq!(loaded.resume_index(), Some(3));
    }

    #[tokio::test]
    async fn last_write_wins_and_clears_resume_index() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = Utc::now();
        storage
            .set("job", &Checkpoint::in_progress(now, 5, lease("run-1", now)))
            .await
            .unwrap();
        let done = Checkpoint::complete(now + Duration::days(1));
        storage.set("job", &done).await.unwrap();

        let loaded = storage.get("job").await.unwrap().unwrap();
        assert_eq!(loaded, done);
        assert_eq!(loaded.resume_index(), None);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoints.db");
        let now = Utc::now();

        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage
                .set("browser_history", &Checkpoint::complete(now))
                .await
                .unwrap();
            storage
                .set("periodic_snapshots", &Checkpoint::in_progress(now, 2, lease("run-1", now)))
                .await
                .unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        let all = storage.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "browser_history");
        assert!(all[0].1.is_complete());
        assert_eq!(all[1].1.resume_index(), Some(2));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = Utc::now();
        storage.set("a", &Checkpoint::init(now)).await.unwrap();
        storage.set("b", &Checkpoint::complete(now)).await.unwrap();
        assert!(storage.get("a").await.unwrap().unwrap().is_init());
        assert!(storage.get("b").await.unwrap().unwrap().is_complete());
    }
}
