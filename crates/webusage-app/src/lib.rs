//! # webusage-app
//!
//! 에이전트 오케스트레이션 계층.
//! 어댑터를 묶는 [`context::OrchestratorContext`], 시간 창 계산, 작업 디스패치,
//! API별 핸들러, 스냅샷 배치 오케스트레이터, 라이프사이클/만료 관리를 담당한다.

pub mod context;
pub mod dispatcher;
pub mod expiration;
pub mod handlers;
pub mod interval;
pub mod lease;
pub mod lifecycle;
pub mod snapshot;
pub mod status;

#[cfg(test)]
mod testing;
