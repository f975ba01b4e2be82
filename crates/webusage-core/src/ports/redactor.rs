//! 수집 HTML 비식별화 포트.

/// 저장 전에 페이지 HTML에서 민감한 부분을 제거한다.
pub trait Redactor: Send + Sync {
    /// `url`의 HTML을 비식별화해 반환
    fn redact(&self, url: &str, html: &str) -> String;
}

/// 아무것도 제거하지 않는 구현
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRedactor;

impl Redactor for NoopRedactor {
    fn redact(&self, _url: &str, html: &str) -> String {
        html.to_string()
    }
}
