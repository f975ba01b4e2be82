//! # webusage-monitor
//!
//! 브라우저 관찰 어댑터.
//! 오케스트레이터가 만든 탭을 추적하고, 페이지 스크립트와 메시지를 주고받고,
//! 사용자 탭 활동을 기록하며, 자동 방문이 남긴 기록을 지운다.
//!
//! ## 모듈
//! - `generated_tabs`: 오케스트레이터 생성 탭 레지스트리
//! - `messaging`: 탭 메시징 채널 + 포커스 상태
//! - `activity`: 활동/중복 추적기
//! - `compensation`: 자동 방문 기록 보정
//! - `redaction`: 규칙 기반 HTML 비식별화
//! - `routing`: 수집 결과를 저장 서버/후처리기로 전달

pub mod activity;
pub mod compensation;
pub mod generated_tabs;
pub mod messaging;
pub mod redaction;
pub mod routing;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
