//! WebUsage 핵심 에러 타입.
//!
//! - [`CoreError`]: 설정, 저장소, 네트워크, 브라우저 호스트 등 인프라 계층 에러
//! - [`MessagingError`]: 페이지 내 스크립트와의 요청/응답 실패 분류
//!
//! 두 타입 모두 작업(job) 또는 대상(target) 경계에서 잡혀 로그로 남고,
//! 프로세스 전체를 중단시키지 않는다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류 (반복 정책 누락 등). 항상 error 레벨로 보고한다.
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패: {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Tab", "Handler")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 서비스 일시 불가 (503)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// 저장 서버가 데이터를 거부함 (`success` 키 없는 응답)
    #[error("저장 거부: {0}")]
    Rejected(String),

    /// 브라우저 호스트 호출 실패
    #[error("브라우저 호스트 에러: {0}")]
    Host(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 실행 타임아웃
    #[error("실행 타임아웃: {timeout_ms}ms 초과")]
    ExecutionTimeout {
        /// 초과된 타임아웃 시간 (밀리초)
        timeout_ms: u64,
    },
}

/// 페이지 내 스크립트와의 메시징 실패 분류.
///
/// 호출자는 variant에 따라 로그 레벨과 처리 방식을 달리한다.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// 스크립트가 응답하지 않음 (수신자 없음, 빈 응답)
    #[error("응답 없음: {subject}")]
    UndefinedResponse {
        /// 요청 메시지 주제
        subject: String,
    },

    /// 비공개(시크릿) 컨텍스트: 표준 활동 스트림에서 제외
    #[error("비공개 컨텍스트 무시")]
    PrivateContext,

    /// 최근 로드 이벤트와 너무 가까워 중복으로 간주
    #[error("중복 로드 이벤트 억제: {elapsed_ms}ms < {threshold_ms}ms")]
    Threshold {
        /// 직전 로드 이벤트 이후 경과 시간
        elapsed_ms: i64,
        /// 설정된 임계값
        threshold_ms: i64,
    },

    /// 응답 대기 시간 초과
    #[error("응답 타임아웃: {timeout_ms}ms 초과")]
    Timeout {
        /// 타임아웃 (밀리초)
        timeout_ms: u64,
    },

    /// 호스트가 메시지를 전달하지 못함
    #[error("호스트 전달 실패: {0}")]
    HostDelivery(#[source] CoreError),
}

impl MessagingError {
    /// 정상 흐름의 일부로 보고 info 레벨로만 남길 실패인지
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::PrivateContext | Self::Threshold { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informational_kinds() {
        assert!(MessagingError::PrivateContext.is_informational());
        assert!(MessagingError::Threshold {
            elapsed_ms: 10,
            threshold_ms: 1000
        }
        .is_informational());
        assert!(!MessagingError::Timeout { timeout_ms: 5 }.is_informational());
        assert!(!MessagingError::HostDelivery(CoreError::Host("closed".into())).is_informational());
    }

    #[test]
    fn threshold_message_includes_values() {
        let err = MessagingError::Threshold {
            elapsed_ms: 120,
            threshold_ms: 1000,
        };
        let msg = err.to_string();
        assert!(msg.contains("120ms"));
        assert!(msg.contains("1000ms"));
    }
}
