use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::normalize;

/// Normalized source URL -> local asset URL, built up over one run.
pub type ResolvedMap = HashMap<String, String>;

lazy_static! {
    // Markdown image: ![alt](url) with an optional title.
    static ref MARKDOWN_IMAGE: Regex =
        Regex::new(r#"!\[[^\]]*\]\(\s*([^)\s]+)(?:\s+"[^"]*")?\s*\)"#).unwrap();
    // Inline HTML image tag.
    static ref IMG_TAG: Regex =
        Regex::new(r#"(?i)<img[^>]*?\ssrc\s*=\s*["']([^"']+)["']"#).unwrap();
    // Bare hotlink: an http(s) URL with an image extension, which the
    // renderer turns into an image on its own line or inline.
    static ref BARE_IMAGE_URL: Regex = Regex::new(
        r#"(?i)https?://[^\s<>"'()]+\.(?:png|jpe?g|gif|webp|avif)(?:\?[^\s<>"'()]*)?"#,
    )
    .unwrap();
}

/// Rewrite hotlinked image occurrences in the raw message source.
///
/// Each occurrence recognized by the hotlink detection rules is normalized
/// and looked up in `resolved`; on a hit the URL (and only the URL) is
/// replaced with the local asset URL. Occurrences with no resolved entry and
/// all surrounding text are left byte-identical, including fenced code
/// blocks and inline code spans.
pub fn rewrite(raw: &str, resolved: &ResolvedMap) -> String {
    if resolved.is_empty() {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut in_fence = false;
    for line in raw.split_inclusive('\n') {
        let stripped = line.trim_start();
        if stripped.starts_with("```") || stripped.starts_with("~~~") {
            in_fence = !in_fence;
            out.push_str(line);
            continue;
        }
        if in_fence {
            out.push_str(line);
        } else {
            out.push_str(&rewrite_line(line, resolved));
        }
    }
    out
}

/// Rewrite one line, leaving inline code spans untouched.
///
/// A code span opens with a run of N backticks and closes at the next run of
/// exactly N; an opening run with no matching close renders as literal text.
fn rewrite_line(line: &str, resolved: &ResolvedMap) -> String {
    if !line.contains('`') {
        return substitute(line, resolved);
    }
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut plain_start = 0;
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] != b'`' {
            pos += 1;
            continue;
        }
        let run_start = pos;
        while pos < bytes.len() && bytes[pos] == b'`' {
            pos += 1;
        }
        let run_len = pos - run_start;
        if let Some(close) = find_closing_run(bytes, pos, run_len) {
            out.push_str(&substitute(&line[plain_start..run_start], resolved));
            out.push_str(&line[run_start..close + run_len]);
            pos = close + run_len;
            plain_start = pos;
        }
    }
    out.push_str(&substitute(&line[plain_start..], resolved));
    out
}

/// Position of the next backtick run of exactly `len`, scanning from `from`.
fn find_closing_run(bytes: &[u8], from: usize, len: usize) -> Option<usize> {
    let mut pos = from;
    while pos < bytes.len() {
        if bytes[pos] != b'`' {
            pos += 1;
            continue;
        }
        let start = pos;
        while pos < bytes.len() && bytes[pos] == b'`' {
            pos += 1;
        }
        if pos - start == len {
            return Some(start);
        }
    }
    None
}

fn substitute(text: &str, resolved: &ResolvedMap) -> String {
    let pass = MARKDOWN_IMAGE.replace_all(text, |caps: &Captures| {
        swap_captured_url(caps, resolved)
    });
    let pass = IMG_TAG.replace_all(&pass, |caps: &Captures| swap_captured_url(caps, resolved));
    replace_bare_urls(&pass, resolved)
}

/// Third pass: bare hotlinks. A URL sitting in a markdown link target or an
/// anchor href renders as a plain link, not an image, and is left alone.
fn replace_bare_urls(text: &str, resolved: &ResolvedMap) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in BARE_IMAGE_URL.find_iter(text) {
        out.push_str(&text[last..found.start()]);
        let url = found.as_str();
        match resolved.get(&normalize(url)) {
            Some(local) if !is_link_target(text, found.start()) => out.push_str(local),
            _ => out.push_str(url),
        }
        last = found.end();
    }
    out.push_str(&text[last..]);
    out
}

fn is_link_target(text: &str, start: usize) -> bool {
    let before = &text[..start];
    if before.ends_with("](") {
        return true;
    }
    let rest = before.trim_end_matches(['"', '\'']).trim_end();
    let Some(rest) = rest.strip_suffix('=') else {
        return false;
    };
    let rest = rest.trim_end();
    rest.len() >= 4
        && rest.is_char_boundary(rest.len() - 4)
        && rest[rest.len() - 4..].eq_ignore_ascii_case("href")
}

/// Replace the URL capture within a match, keeping the rest of the match
/// byte-identical.
fn swap_captured_url(caps: &Captures, resolved: &ResolvedMap) -> String {
    let whole = &caps[0];
    let url = &caps[1];
    match resolved.get(&normalize(url)) {
        Some(local) => whole.replacen(url, local, 1),
        None => whole.to_string(),
    }
}
