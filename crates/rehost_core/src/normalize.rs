use url::Url;

/// Canonical, scheme-less form of a URL used as the run-scoped dedup key.
///
/// `http://CDN.example.com/a.png` and `https://cdn.example.com/a.png` both
/// collapse to `//cdn.example.com/a.png`. Scheme-relative input is accepted
/// as-is. On parse failure the trimmed literal is returned unchanged, so
/// distinct malformed strings simply never dedup against each other.
pub fn normalize(src: &str) -> String {
    let trimmed = src.trim();
    let absolute;
    let candidate = if trimmed.starts_with("//") {
        absolute = format!("http:{trimmed}");
        absolute.as_str()
    } else {
        trimmed
    };
    match Url::parse(candidate) {
        Ok(parsed) if parsed.host_str().is_some() => {
            // The url crate has already case-folded the host and applied
            // standard path/query escaping; dropping the scheme yields the
            // `//host/path` key.
            parsed.as_str()[parsed.scheme().len() + 1..].to_string()
        }
        _ => trimmed.to_string(),
    }
}
