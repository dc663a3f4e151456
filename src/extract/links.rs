use url::Url;

use super::ExtractError;

/// Query parameters that only carry referral or campaign tracking.
const TRACKING_PARAMS: [&str; 4] = ["ref", "fbclid", "gclid", "mc_cid"];

/// Resolve `href` against `base`, accepting only http(s) results.
pub fn resolve(href: &str, base: &Url) -> Option<Url> {
    try_resolve(href, base).ok()
}

/// Like [`resolve`] but reports why a link was rejected.
pub fn try_resolve(href: &str, base: &Url) -> Result<Url, ExtractError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(ExtractError::InvalidUrl { href: href.to_string() });
    }

    let resolved = base
        .join(href)
        .map_err(|_| ExtractError::InvalidUrl { href: href.to_string() })?;

    match resolved.scheme() {
        "http" | "https" => Ok(resolved),
        _ => Err(ExtractError::UnsupportedScheme { url: resolved.to_string() }),
    }
}

/// Dedup key for a URL: query string and fragment removed.
///
/// Host case and default ports are already normalized by the parser.
pub fn canonicalize(url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_query(None);
    canonical.set_fragment(None);
    canonical.to_string()
}

/// Parse-then-canonicalize for URLs held as strings.
pub fn canonicalize_str(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|u| canonicalize(&u))
}

/// Resolve an anchor target for publishing: absolute, http(s), tracking
/// parameters removed.
pub fn clean_href(href: &str, base: &Url) -> Option<Url> {
    let mut url = resolve(href, base)?;

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Some(url)
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}
