//! Next list-page resolution.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::links::{canonicalize, resolve};
use super::text::element_text;

const PAGE_PARAM: &str = "page";

static REL_NEXT: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("a[rel~='next'][href], link[rel~='next'][href]").ok());

static ANCHORS: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("a[href]").ok());

static NEXT_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:next(?:\s+page)?|more\s+jobs|older|»|›|>|→|next\s*[»›>→])$")
        .expect("next phrase pattern is valid")
});

/// URL of the page after `current`.
///
/// Explicit `rel=next` wins, then an anchor labelled as a next-page link,
/// then the `page` query parameter of `current` incremented (or set to 2).
pub fn next_page_url(document: &Html, current: &Url) -> Option<Url> {
    rel_next(document, current)
        .or_else(|| labelled_next(document, current))
        .or_else(|| increment_page(current))
}

fn rel_next(document: &Html, current: &Url) -> Option<Url> {
    let selector = REL_NEXT.as_ref()?;
    document
        .select(selector)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| resolve(href, current))
        .find(|url| !is_same_page(url, current))
}

fn labelled_next(document: &Html, current: &Url) -> Option<Url> {
    let selector = ANCHORS.as_ref()?;
    document
        .select(selector)
        .filter(|anchor| {
            let label = anchor.value().attr("aria-label").map(str::trim).unwrap_or_default();
            NEXT_PHRASE_RE.is_match(&element_text(anchor)) || NEXT_PHRASE_RE.is_match(label)
        })
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| resolve(href, current))
        .find(|url| !is_same_page(url, current))
}

fn is_same_page(candidate: &Url, current: &Url) -> bool {
    candidate == current
        || (canonicalize(candidate) == canonicalize(current) && candidate.query() == current.query())
}

/// `?page=N` becomes `?page=N+1`; other parameters keep their order.
pub fn increment_page(current: &Url) -> Option<Url> {
    let mut found = false;
    let mut pairs: Vec<(String, String)> = Vec::new();

    for (key, value) in current.query_pairs() {
        if key == PAGE_PARAM && !found {
            let page: u64 = value.trim().parse().ok()?;
            pairs.push((key.into_owned(), page.checked_add(1)?.to_string()));
            found = true;
        } else {
            pairs.push((key.into_owned(), value.into_owned()));
        }
    }

    if !found {
        pairs.push((PAGE_PARAM.to_string(), "2".to_string()));
    }

    let mut next = current.clone();
    next.set_fragment(None);
    next.query_pairs_mut().clear().extend_pairs(pairs);
    Some(next)
}
