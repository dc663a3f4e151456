//! Reduction of rich description markup to a small, attribute-free subset.
//!
//! The source fragment is only read; a separate clean tree is built from
//! it and serialized. Running the output back through [`sanitize_html`]
//! yields the same bytes.

use scraper::node::Element;
use scraper::{ElementRef, Html, Node};
use url::Url;

use super::links::clean_href;
use super::record::Description;
use super::text::normalize;

/// Tags that survive with their structure intact.
const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "b", "strong", "i", "em", "u", "ol", "ul", "li", "h1", "h2", "h3", "h4", "h5",
    "h6", "a", "span", "div", "section", "article",
];

/// Tags dropped together with everything inside them.
const REMOVED_TAGS: &[&str] = &[
    // scripting and styling
    "script", "style", "noscript", "template", "link", "meta", "head", "title",
    // embedded media
    "iframe", "frame", "frameset", "object", "embed", "video", "audio", "source", "track",
    "canvas", "svg", "img", "picture", "map",
    // interactive controls
    "button", "input", "select", "option", "textarea", "form", "label", "fieldset", "dialog",
    // navigational chrome
    "nav", "header", "footer", "aside", "menu",
];

/// class/id fragments that mark boilerplate blocks.
const BOILERPLATE_MARKERS: &[&str] = &[
    "social", "share", "apply", "login", "banner", "ad-", "advert", "cookie",
];

/// Tags that break the plain-text view into separate runs.
const BLOCK_TAGS: &[&str] = &[
    "p", "br", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
];

/// Elements nested deeper than this are flattened to their text, which
/// keeps the recursive walks below on a bounded stack.
const MAX_DEPTH: usize = 96;

#[derive(Debug, Clone, PartialEq)]
enum CleanNode {
    Text(String),
    Element {
        tag: String,
        href: Option<String>,
        children: Vec<CleanNode>,
    },
}

/// Sanitize the contents of `fragment`; the fragment's own tag is not kept.
pub fn sanitize(fragment: ElementRef<'_>, base: &Url) -> Description {
    let mut nodes = Vec::new();
    clean_children(fragment, base, 0, &mut nodes);
    finish_children(&mut nodes);

    let mut html = String::new();
    for node in &nodes {
        write_node(node, &mut html);
    }

    let mut text = String::new();
    for node in &nodes {
        collect_text(node, &mut text);
    }

    Description {
        html,
        text: normalize(&text),
    }
}

/// Parse a markup string as a body fragment and sanitize it.
pub fn sanitize_html(markup: &str, base: &Url) -> Description {
    let fragment = Html::parse_fragment(markup);
    sanitize(fragment.root_element(), base)
}

fn clean_children(parent: ElementRef<'_>, base: &Url, depth: usize, out: &mut Vec<CleanNode>) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => push_text(out, text),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    clean_element(element, base, depth + 1, out);
                }
            }
            _ => {}
        }
    }
}

fn clean_element(element: ElementRef<'_>, base: &Url, depth: usize, out: &mut Vec<CleanNode>) {
    let value = element.value();
    let tag = value.name().to_ascii_lowercase();

    if is_dropped(value) {
        return;
    }

    if depth >= MAX_DEPTH {
        let text = flatten_text(element);
        if !text.is_empty() {
            push_text(out, &format!(" {} ", text));
        }
        return;
    }

    let mut children = Vec::new();
    clean_children(element, base, depth, &mut children);
    finish_children(&mut children);

    if !ALLOWED_TAGS.contains(&tag.as_str()) {
        // Structure goes, text stays
        let mut text = String::new();
        for child in &children {
            collect_text(child, &mut text);
        }
        let text = normalize(&text);
        if !text.is_empty() {
            push_text(out, &format!(" {} ", text));
        }
        return;
    }

    if tag != "br" && children.is_empty() {
        return;
    }

    // The href is read before anything else about the element is dropped
    let href = if tag == "a" {
        value
            .attr("href")
            .and_then(|h| clean_href(h, base))
            .map(String::from)
    } else {
        None
    };

    let children = if tag == "br" { Vec::new() } else { children };
    out.push(CleanNode::Element { tag, href, children });
}

fn is_dropped(element: &Element) -> bool {
    let tag = element.name().to_ascii_lowercase();
    REMOVED_TAGS.contains(&tag.as_str()) || is_boilerplate(element.attr("class"), element.attr("id"))
}

/// Text of a whole subtree, walked with an explicit stack. Dropped
/// elements contribute nothing.
fn flatten_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    let mut stack = vec![*element];

    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(run) => text.push_str(run),
            Node::Element(el) if !is_dropped(el) => {
                if BLOCK_TAGS.contains(&el.name()) {
                    text.push(' ');
                }
                stack.extend(node.children().rev());
            }
            _ => {}
        }
    }

    normalize(&text)
}

fn is_boilerplate(class: Option<&str>, id: Option<&str>) -> bool {
    [class, id].into_iter().flatten().any(|attr| {
        let attr = attr.to_ascii_lowercase();
        BOILERPLATE_MARKERS.iter().any(|marker| attr.contains(marker))
    })
}

/// Adjacent text runs are merged so serialization round-trips.
fn push_text(out: &mut Vec<CleanNode>, text: &str) {
    if let Some(CleanNode::Text(last)) = out.last_mut() {
        last.push_str(text);
    } else {
        out.push(CleanNode::Text(text.to_string()));
    }
}

/// Collapse whitespace inside text runs. A run that is only whitespace
/// stays as one space between two inline siblings and goes everywhere else.
fn finish_children(children: &mut Vec<CleanNode>) {
    for child in children.iter_mut() {
        if let CleanNode::Text(text) = child {
            *text = collapse_whitespace(text);
        }
    }

    let keep: Vec<bool> = (0..children.len())
        .map(|i| match &children[i] {
            CleanNode::Text(text) if text.trim().is_empty() => {
                i > 0
                    && i + 1 < children.len()
                    && is_inline(&children[i - 1])
                    && is_inline(&children[i + 1])
            }
            _ => true,
        })
        .collect();

    let mut keep = keep.into_iter();
    children.retain(|_| keep.next().unwrap_or(true));
}

fn is_inline(node: &CleanNode) -> bool {
    match node {
        CleanNode::Text(_) => true,
        CleanNode::Element { tag, .. } => !BLOCK_TAGS.contains(&tag.as_str()),
    }
}

/// Like `normalize`, but a single edge space survives so inline runs do not
/// fuse with their neighbours.
fn collapse_whitespace(raw: &str) -> String {
    let leading = raw.starts_with(|c: char| c.is_whitespace());
    let trailing = raw.ends_with(|c: char| c.is_whitespace());
    let core = normalize(raw);
    if core.is_empty() {
        return if leading { " ".to_string() } else { String::new() };
    }

    let mut out = String::with_capacity(core.len() + 2);
    if leading {
        out.push(' ');
    }
    out.push_str(&core);
    if trailing {
        out.push(' ');
    }
    out
}

fn collect_text(node: &CleanNode, out: &mut String) {
    match node {
        CleanNode::Text(text) => out.push_str(text),
        CleanNode::Element { tag, children, .. } => {
            let block = BLOCK_TAGS.contains(&tag.as_str());
            if block {
                out.push(' ');
            }
            for child in children {
                collect_text(child, out);
            }
            if block {
                out.push(' ');
            }
        }
    }
}

fn write_node(node: &CleanNode, out: &mut String) {
    match node {
        CleanNode::Text(text) => escape_into(text, false, out),
        CleanNode::Element { tag, href, children } => {
            out.push('<');
            out.push_str(tag);
            if let Some(href) = href {
                out.push_str(" href=\"");
                escape_into(href, true, out);
                out.push('"');
            }
            out.push('>');

            if tag == "br" {
                return;
            }

            for child in children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn escape_into(raw: &str, attribute: bool, out: &mut String) {
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.example.com/jobs/view").unwrap()
    }

    fn clean(markup: &str) -> Description {
        sanitize_html(markup, &base())
    }

    #[test]
    fn test_anchor_keeps_only_absolute_href() {
        let out = clean(r#"<p>See <a href="/listings/42?ref=x" class="btn" onclick="track()">the role</a></p>"#);
        assert_eq!(
            out.html,
            r#"<p>See <a href="https://www.example.com/listings/42">the role</a></p>"#
        );
    }

    #[test]
    fn test_attributes_cleared_everywhere() {
        let out = clean(r#"<div style="color:red" data-x="1"><strong id="lead">Pay</strong> is good</div>"#);
        assert_eq!(out.html, "<div><strong>Pay</strong> is good</div>");
    }

    #[test]
    fn test_removes_scripts_media_and_chrome() {
        let out = clean(
            r#"<p>Keep</p><script>alert(1)</script><style>p{}</style>
               <img src="x.png"><nav><a href="/">Home</a></nav><button>Click</button>
               <iframe src="https://video"></iframe>"#,
        );
        assert_eq!(out.html, "<p>Keep</p>");
        assert_eq!(out.text, "Keep");
    }

    #[test]
    fn test_removes_boilerplate_by_class_or_id() {
        let out = clean(
            r#"<div class="Social-Links">Share me</div>
               <div id="apply-box">Apply now</div>
               <div class="top-ad-slot">Buy</div>
               <section class="cookie-consent">Cookies</section>
               <p>Role summary</p>"#,
        );
        assert_eq!(out.html, "<p>Role summary</p>");
    }

    #[test]
    fn test_unlisted_tags_become_text() {
        let out = clean("<table><tr><td>Lagos</td><td>Hybrid</td></tr></table><p><code>rust</code> skills</p>");
        assert_eq!(out.html, " Lagos Hybrid <p> rust skills</p>");
        assert_eq!(out.text, "Lagos Hybrid rust skills");
    }

    #[test]
    fn test_prunes_empty_elements_but_keeps_breaks() {
        let out = clean("<p></p><div><span> </span></div><p>One<br>Two</p><ul><li></li></ul>");
        assert_eq!(out.html, "<p>One<br>Two</p>");
        assert_eq!(out.text, "One Two");
    }

    #[test]
    fn test_collapses_inter_tag_whitespace() {
        let out = clean("<ul>\n   <li>  First\n point </li>\n\n  <li>Second</li>\n</ul>");
        assert_eq!(out.html, "<ul><li> First point </li><li>Second</li></ul>");
    }

    #[test]
    fn test_space_between_inline_siblings_survives() {
        let out = clean("<p><b>Senior</b> <i>Engineer</i></p>");
        assert_eq!(out.html, "<p><b>Senior</b> <i>Engineer</i></p>");
        assert_eq!(out.text, "Senior Engineer");

        let out = clean("<p>\n  <b>a</b>\n  \t <i>b</i>\n</p>");
        assert_eq!(out.html, "<p><b>a</b> <i>b</i></p>");
        assert_eq!(out.text, "a b");
    }

    #[test]
    fn test_deep_nesting_on_small_stack() {
        let depth = 20_000;
        let markup = format!("{}x{}", "<span>".repeat(depth), "</span>".repeat(depth));

        let out = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || {
                let once = clean(&markup);
                let twice = clean(&once.html);
                (once, twice)
            })
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(out.0.text, "x");
        assert!(out.0.html.matches("<span>").count() < MAX_DEPTH);
        assert_eq!(out.1.html, out.0.html);
    }

    #[test]
    fn test_escapes_text() {
        let out = clean("<p>R&amp;D &lt;team&gt;</p>");
        assert_eq!(out.html, "<p>R&amp;D &lt;team&gt;</p>");
        assert_eq!(out.text, "R&D <team>");
    }

    #[test]
    fn test_source_document_is_untouched() {
        let document = Html::parse_document(r#"<div id="desc"><p class="x">Hi</p><script>1</script></div>"#);
        let selector = scraper::Selector::parse("#desc").unwrap();
        let fragment = document.select(&selector).next().unwrap();
        let before = fragment.html();

        let out = sanitize(fragment, &base());
        assert_eq!(out.html, "<p>Hi</p>");
        assert_eq!(fragment.html(), before);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let samples = [
            r#"<div class="job"><h2>About</h2><p>We build <b>things</b>&nbsp;&nbsp;fast.</p>
               <ul><li>Rust</li><li><a href="/team?utm_source=x#top" target="_blank">Team</a></li></ul>
               <table><tr><td>Salary</td><td>NGN 80,000</td></tr></table>
               <div class="share-bar"><a href="https://twitter.com">Tweet</a></div></div>"#,
            "<p>One<br>Two</p><p> spaced   text </p>",
            "plain text only",
            r#"<a href="javascript:void(0)">Apply</a><a href="mailto:a@b.c">Mail</a>"#,
            "<section><article><h1>T</h1><span>x</span> <em>y</em></article></section>",
            "<p>R&amp;D &lt;team&gt; &quot;quoted&quot;</p>",
            "<p><b>Senior</b> <i>Engineer</i></p>",
        ];

        for sample in samples {
            let once = clean(sample);
            let twice = clean(&once.html);
            assert_eq!(twice.html, once.html, "not idempotent for {sample}");
        }
    }
}
