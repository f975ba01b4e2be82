//! 작업 체크포인트 모델.
//!
//! 체크포인트는 작업 재개의 유일한 근거다. `resume_index`와 lease는
//! `in_progress` 상태에만 존재하도록 enum variant 안에 둔다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 실행 중인 작업의 소유권 표시
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// lease를 잡은 프로세스 실행 ID
    pub owner: String,
    /// 마지막 진행 기록 시각
    pub renewed_at: DateTime<Utc>,
}

/// 체크포인트 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckpointState {
    /// 등록 직후, 아직 한 번도 실행되지 않음
    Init,
    /// 배치 실행 중
    InProgress {
        /// 다음에 처리할 대상 위치
        resume_index: usize,
        /// 실행 소유권
        lease: Lease,
    },
    /// 마지막 시간 창 완료
    Complete,
}

/// 작업별 체크포인트 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 상태
    #[serde(flatten)]
    pub state: CheckpointState,
    /// 논리 시각. init이면 등록 시각, in_progress면 현재 시간 창의 시작,
    /// complete면 완료된 시간 창의 끝.
    pub timestamp: DateTime<Utc>,
}

/// lease 판정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseStatus {
    /// 실행 중인 배치 없음
    Free,
    /// 이 프로세스의 배치가 살아 있음
    Held,
    /// 다른 실행 ID가 남긴 lease (이전 프로세스 종료)
    Orphaned {
        /// 이어서 처리할 위치
        resume_index: usize,
    },
    /// 이 프로세스가 잡았지만 TTL 동안 갱신되지 않음
    Stale {
        /// 이어서 처리할 위치
        resume_index: usize,
    },
}

impl Checkpoint {
    /// init 체크포인트
    pub fn init(timestamp: DateTime<Utc>) -> Self {
        Self {
            state: CheckpointState::Init,
            timestamp,
        }
    }

    /// in_progress 체크포인트
    pub fn in_progress(timestamp: DateTime<Utc>, resume_index: usize, lease: Lease) -> Self {
        Self {
            state: CheckpointState::InProgress {
                resume_index,
                lease,
            },
            timestamp,
        }
    }

    /// complete 체크포인트
    pub fn complete(timestamp: DateTime<Utc>) -> Self {
        Self {
            state: CheckpointState::Complete,
            timestamp,
        }
    }

    pub fn is_init(&self) -> bool {
        matches!(self.state, CheckpointState::Init)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, CheckpointState::Complete)
    }

    /// in_progress일 때만 재개 위치 반환
    pub fn resume_index(&self) -> Option<usize> {
        match &self.state {
            CheckpointState::InProgress { resume_index, .. } => Some(*resume_index),
            _ => None,
        }
    }

    /// 상태 이름 (`init` / `in_progress` / `complete`)
    pub fn state_name(&self) -> &'static str {
        match self.state {
            CheckpointState::Init => "init",
            CheckpointState::InProgress { .. } => "in_progress",
            CheckpointState::Complete => "complete",
        }
    }

    /// lease 상태 판정
    pub fn lease_status(&self, owner: &str, now: DateTime<Utc>, ttl: Duration) -> LeaseStatus {
        let CheckpointState::InProgress {
            resume_index,
            lease,
        } = &self.state
        else {
            return LeaseStatus::Free;
        };

        if lease.owner != owner {
            LeaseStatus::Orphaned {
                resume_index: *resume_index,
            }
        } else if now - lease.renewed_at > ttl {
            LeaseStatus::Stale {
                resume_index: *resume_index,
            }
        } else {
            LeaseStatus::Held
        }
    }
}
