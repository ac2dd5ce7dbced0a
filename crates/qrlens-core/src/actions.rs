//! Follow-up actions on a presented result.

use crate::capabilities::{HostCapabilities, ShareMethod};
use crate::types::{PayloadKind, ScanResult};
use chrono::{DateTime, Local, Utc};

/// Primary action offered for a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultAction {
    /// Open a link in the browser.
    OpenLink(String),
    /// Hand the text to the share sheet or clipboard.
    Share { method: ShareMethod, text: String },
}

/// Pick the primary action for `result`.
pub fn primary_action(result: &ScanResult, caps: &HostCapabilities) -> ResultAction {
    match result.kind {
        PayloadKind::Url => ResultAction::OpenLink(link_target(&result.content)),
        _ => ResultAction::Share {
            method: caps.share_method(),
            text: result.content.clone(),
        },
    }
}

/// URL to open for a link payload, adding a scheme when missing.
pub fn link_target(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Short timestamp for history lists, e.g. `07/03 14:05`.
pub fn format_short_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%d/%m %H:%M").to_string()
}

/// Truncate long payloads for single-line display.
pub fn truncate_for_display(content: &str, max_chars: usize) -> String {
    let single_line: String = content
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let kept: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(content: &str, kind: PayloadKind) -> ScanResult {
        ScanResult::new(content, kind, Utc::now())
    }

    #[test]
    fn test_link_target_adds_scheme() {
        assert_eq!(link_target("example.com"), "https://example.com");
        assert_eq!(link_target(" http://a.io "), "http://a.io");
    }

    #[test]
    fn test_url_opens_link() {
        let action = primary_action(
            &result("https://a.io", PayloadKind::Url),
            &HostCapabilities::none(),
        );
        assert_eq!(action, ResultAction::OpenLink("https://a.io".to_string()));
    }

    #[test]
    fn test_text_shares_or_copies() {
        let r = result("hello", PayloadKind::Text);
        let action = primary_action(&r, &HostCapabilities::none());
        assert_eq!(
            action,
            ResultAction::Share {
                method: ShareMethod::CopyToClipboard,
                text: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_truncate_for_display() {
        assert_eq!(truncate_for_display("short", 10), "short");
        assert_eq!(truncate_for_display("abcdefghij", 5), "abcd…");
        assert_eq!(truncate_for_display("a\nb", 10), "a b");
    }

    #[test]
    fn test_format_short_timestamp_shape() {
        let s = format_short_timestamp(Utc::now());
        assert_eq!(s.len(), 11);
        assert_eq!(&s[2..3], "/");
        assert_eq!(&s[8..9], ":");
    }
}
