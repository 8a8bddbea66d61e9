use url::Url;

use crate::RehostConfig;

/// Decide whether a candidate source URL is worth downloading.
///
/// Pure decision function, no side effects. `known_upload` answers whether a
/// URL is already recognized as one of our own stored assets; callers bind it
/// to their storage lookup.
///
/// Rejection ladder, in order:
/// - blank input
/// - any configured local base prefix (own base URL, asset host, emoji host)
/// - absolute-path URLs (leading `/` but not `//`), which are same-origin
///   already
/// - URLs the store recognizes as existing local uploads
/// - anything that fails to parse as a URL or has no host (relative forms)
///
/// Survivors are put to the site-wide download policy, whose verdict is final.
pub fn is_eligible(src: &str, config: &RehostConfig, known_upload: impl Fn(&str) -> bool) -> bool {
    let src = src.trim();
    if src.is_empty() {
        return false;
    }
    if config
        .local_bases
        .iter()
        .any(|base| !base.is_empty() && src.starts_with(base.as_str()))
    {
        return false;
    }
    if src.starts_with('/') && !src.starts_with("//") {
        return false;
    }
    if known_upload(src) {
        return false;
    }
    let parsed = match Url::parse(src) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    let host = match parsed.host_str() {
        Some(host) => host,
        None => return false,
    };
    config.should_download(host)
}
