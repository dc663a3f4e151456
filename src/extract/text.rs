use scraper::ElementRef;

/// Attributes that commonly carry the untruncated version of a label.
const RICH_TEXT_ATTRS: [&str; 3] = ["title", "aria-label", "data-title"];

/// Collapse whitespace, drop control characters and trim the ends.
///
/// Non-breaking spaces, tabs and newlines all count as whitespace, so any
/// run of them becomes a single ASCII space.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.chars() {
        if ch.is_whitespace() || ch == '\u{a0}' {
            pending_space = true;
            continue;
        }
        if ch.is_control() {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }

    out
}

/// Visible text of an element, normalized.
pub fn element_text(element: &ElementRef) -> String {
    normalize(&element.text().collect::<Vec<_>>().join(" "))
}

/// Prefer an attribute-carried label over visible text.
///
/// Listing markup often clips long titles with an ellipsis while keeping
/// the full string in `title`, `aria-label` or `data-title`.
pub fn prefer_rich_text(element: &ElementRef) -> String {
    let value = element.value();
    for attr in RICH_TEXT_ATTRS {
        if let Some(candidate) = value.attr(attr) {
            let candidate = normalize(candidate);
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    element_text(element)
}

/// Replace the single-glyph ellipsis with three periods.
pub fn restore_ellipsis(s: &str) -> String {
    s.replace('\u{2026}', "...")
}

/// `Some(normalized)` when the value has content, otherwise `None`.
pub fn non_empty(raw: &str) -> Option<String> {
    let value = normalize(raw);
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  Senior\u{a0}\u{a0}Engineer\t\n  Lagos "), "Senior Engineer Lagos");
        assert_eq!(normalize("a\u{0007}b"), "ab");
        assert_eq!(normalize(" \n\t "), "");
    }

    #[test]
    fn test_prefer_rich_text_uses_attributes() {
        let html = Html::parse_fragment(
            r#"<a title="Head of Product Marketing, West Africa">Head of Product Mar…</a>
               <a aria-label="  ">Visible only</a>"#,
        );
        let selector = Selector::parse("a").unwrap();
        let mut anchors = html.select(&selector);

        let first = anchors.next().unwrap();
        assert_eq!(prefer_rich_text(&first), "Head of Product Marketing, West Africa");

        let second = anchors.next().unwrap();
        assert_eq!(prefer_rich_text(&second), "Visible only");
    }

    #[test]
    fn test_restore_ellipsis() {
        assert_eq!(restore_ellipsis("Head of Product Mar…"), "Head of Product Mar...");
        assert_eq!(restore_ellipsis("no glyph"), "no glyph");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  x "), Some("x".to_string()));
        assert_eq!(non_empty("\u{a0}"), None);
    }
}
