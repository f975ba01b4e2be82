//! WebUsage 도메인 모델.
//!
//! 모든 모델은 `serde` Serialize/Deserialize를 구현한다.
//! 브라우저 쪽 shim과 주고받는 타입은 snake_case 와이어 이름을 쓴다.

pub mod activity;
pub mod checkpoint;
pub mod host;
pub mod job;
pub mod message;
pub mod window;
