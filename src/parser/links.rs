//! Link normalisation and domain filtering
//!
//! Rewriting happens before filtering: a root-relative href is first turned
//! into an absolute URL under the root, then checked against the root-domain
//! substring and the excluded asset paths.

/// Path fragments of binary or alternate-format assets that are never crawled
const EXCLUDED_PATHS: &[&str] = &["/pdf/", "/ps/"];

/// Rewrite a raw href against the configured root URL
///
/// Root-relative hrefs (`/abs/1234`) are prefixed with the root; protocol
/// relative hrefs (`//host/path`) inherit the root's scheme. Anything else is
/// returned unchanged, including relative paths without a leading slash.
pub fn normalize_link(href: &str, root_url: &str) -> String {
    let href = href.trim();

    if let Some(rest) = href.strip_prefix("//") {
        let scheme = root_url.split_once("://").map(|(s, _)| s).unwrap_or("https");
        return format!("{scheme}://{rest}");
    }

    if href.starts_with('/') {
        return format!("{}{}", root_url.trim_end_matches('/'), href);
    }

    href.to_string()
}

/// Whether a normalised URL belongs to the crawl
pub fn is_crawlable(url: &str, root_url: &str) -> bool {
    url.contains(root_url) && !EXCLUDED_PATHS.iter().any(|p| url.contains(p))
}

/// Normalise then filter; `None` when the link is dropped
pub fn crawlable_link(href: &str, root_url: &str) -> Option<String> {
    let url = normalize_link(href, root_url);
    is_crawlable(&url, root_url).then_some(url)
}
