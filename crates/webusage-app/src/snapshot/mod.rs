//! 스냅샷 배치.
//!
//! 표준 창과 비공개 창을 짝지어 대상 URL 목록을 순서대로 열고,
//! 페이지 스크립트가 돌려준 스냅샷을 저장 서버로 보낸다.
//!
//! 주기 하나의 단계: `Idle → Scheduled → Running → Draining → Complete`

mod orchestrator;
mod progress;

pub use orchestrator::SnapshotOrchestrator;
pub use progress::CycleProgress;

use serde::Serialize;
use std::fmt;

/// 배치 주기 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Idle,
    /// 알림 후 시작 지연 대기
    Scheduled,
    Running,
    /// 실패한 대상을 건너뛰며 계속 진행
    Draining,
    Complete,
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// 컨텍스트(창) 하나의 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextReport {
    pub private: bool,
    /// 저장까지 끝난 대상 URL
    pub collected: Vec<String>,
    /// 실패로 건너뛴 대상 URL
    pub skipped: Vec<String>,
    /// 종료 신호로 중간에 멈춤
    pub interrupted: bool,
    /// 창을 열지 못해 대상을 하나도 처리하지 않음
    pub unavailable: bool,
}

/// 배치 주기 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// 재개 위치 (새 주기면 0)
    pub resumed_from: usize,
    pub targets: usize,
    pub contexts: Vec<ContextReport>,
    /// 비공개 창 권한이 없어 표준 창만 실행
    pub private_unavailable: bool,
}

impl BatchReport {
    pub fn collected(&self) -> usize {
        self.contexts.iter().map(|c| c.collected.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.contexts.iter().map(|c| c.skipped.len()).sum()
    }
}
