//! 규칙 기반 HTML 비식별화.
//!
//! 도메인이 일치하는 페이지에서 `marker`를 포함한 태그 하나(`<` … `>`)를 통째로 지운다.
//! 마커 앞의 가장 가까운 `<`부터 마커 뒤의 첫 `>`까지가 한 태그다.

use webusage_core::config::RedactionRule;
use webusage_core::ports::redactor::Redactor;

/// 설정 규칙으로 동작하는 비식별화기
#[derive(Debug, Clone, Default)]
pub struct RuleRedactor {
    rules: Vec<RedactionRule>,
}

impl RuleRedactor {
    pub fn new(rules: Vec<RedactionRule>) -> Self {
        Self { rules }
    }
}

impl Redactor for RuleRedactor {
    fn redact(&self, url: &str, html: &str) -> String {
        let url = url.to_lowercase();
        let mut out = html.to_string();
        for rule in self.rules.iter().filter(|r| url.contains(&r.domain.to_lowercase())) {
            out = strip_tags_containing(&out, &rule.marker);
        }
        out
    }
}

/// `marker`를 포함한 태그 제거
fn strip_tags_containing(html: &str, marker: &str) -> String {
    if marker.is_empty() {
        return html.to_string();
    }

    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(pos) = rest.find(marker) {
        let before = &rest[..pos];
        let after = &rest[pos + marker.len()..];
        match (before.rfind('<'), after.find('>')) {
            (Some(open), Some(close)) => {
                out.push_str(&before[..open]);
                rest = &after[close + 1..];
            }
            _ => {
                out.push_str(&rest[..pos + marker.len()]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(domain: &str, marker: &str) -> RedactionRule {
        RedactionRule {
            domain: domain.into(),
            marker: marker.into(),
        }
    }

    #[test]
    fn removes_single_tag_only() {
        let html = r#"<div><a class="acct x" href="/me">Name</a><p>keep</p></div>"#;
        let out = strip_tags_containing(html, "acct x");
        assert_eq!(out, r#"<div>Name</a><p>keep</p></div>"#);
    }

    #[test]
    fn removes_every_occurrence() {
        let html = r#"<i id="email">a</i><b id="email">b</b>"#;
        assert_eq!(strip_tags_containing(html, r#"id="email""#), "a</i>b</b>");
    }

    #[test]
    fn unterminated_tag_left_alone() {
        let html = "text marker here";
        assert_eq!(strip_tags_containing(html, "marker"), html);
    }

    #[test]
    fn only_matching_domains() {
        let redactor = RuleRedactor::new(vec![rule("youtube.com", r#"id="account-name""#)]);
        let html = r#"<span id="account-name">Me</span>"#;
        assert_eq!(
            redactor.redact("https://WWW.YouTube.com/watch", html),
            "Me</span>"
        );
        assert_eq!(redactor.redact("https://example.com", html), html);
    }
}
