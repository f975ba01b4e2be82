//! # webusage-storage
//!
//! 로컬 저장소 어댑터.
//! 작업 체크포인트를 SQLite에 보관해 프로세스 재시작 후에도 재개할 수 있게 한다.
//!
//! ## 모듈
//! - `sqlite`: 체크포인트 저장소 (CheckpointStore 구현)
//! - `migration`: 스키마 마이그레이션

pub mod migration;
pub mod sqlite;
