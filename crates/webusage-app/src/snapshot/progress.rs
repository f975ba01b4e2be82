//! 배치 진행 위치.
//!
//! 컨텍스트마다 다음 처리 위치를 따로 세고, 체크포인트에는 가장 뒤처진 위치를 쓴다.
//! 중단 후 재개하면 어느 컨텍스트도 대상을 건너뛰지 않는다.

use chrono::{DateTime, Utc};
use tracing::warn;
use webusage_core::error::CoreError;

use crate::lease::JobLease;

pub struct CycleProgress {
    lease: JobLease,
    /// 컨텍스트별 다음 위치. 창을 열지 못한 컨텍스트는 `None`.
    next: Vec<Option<usize>>,
}

impl CycleProgress {
    /// `contexts`개 컨텍스트가 모두 lease의 재개 위치에서 시작
    pub fn new(lease: JobLease, contexts: usize) -> Self {
        let start = lease.resume_index();
        Self {
            lease,
            next: vec![Some(start); contexts],
        }
    }

    /// 기록된 위치 (모든 컨텍스트의 최솟값)
    pub fn committed(&self) -> usize {
        self.lease.resume_index()
    }

    /// 컨텍스트 하나의 다음 위치 갱신. 최솟값이 움직이면 체크포인트에 기록한다.
    pub async fn record(&mut self, context: usize, next: usize) {
        let Some(Some(slot)) = self.next.get_mut(context) else {
            return;
        };
        *slot = (*slot).max(next);
        self.commit_floor().await;
    }

    /// 창을 열지 못한 컨텍스트를 진행 계산에서 뺀다
    pub async fn retire(&mut self, context: usize) {
        if let Some(slot) = self.next.get_mut(context) {
            *slot = None;
        }
        self.commit_floor().await;
    }

    async fn commit_floor(&mut self) {
        let Some(floor) = self.next.iter().flatten().copied().min() else {
            return;
        };
        if floor > self.lease.resume_index() {
            if let Err(e) = self.lease.advance(floor).await {
                // 다음 기록이 다시 시도한다
                warn!("진행 위치 기록 실패 ({floor}): {e}");
            }
        }
    }

    /// 모든 컨텍스트 종료, 논리적 창 끝으로 완료 기록
    pub async fn complete(self, end: DateTime<Utc>) -> Result<(), CoreError> {
        self.lease.complete(end).await
    }

    /// 완료하지 않고 진행 위치만 남긴 채 종료
    pub fn suspend(self) -> usize {
        self.lease.resume_index()
    }
}
