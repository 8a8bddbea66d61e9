use sha2::{Digest, Sha256};
use url::Url;

use crate::fetch::TempDownload;
use crate::store::MessageStore;
use crate::types::{Asset, UserId};

const MAX_NAME_LEN: usize = 80;

/// Derive an asset filename from the origin URL's path, appending an
/// extension inferred from the content type when the name lacks one.
pub fn filename_for(origin_url: &str, content_type: Option<&str>) -> String {
    let stem = Url::parse(origin_url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.last().map(sanitize))
        })
        .filter(|name| !name.is_empty());
    let mut name = stem.unwrap_or_else(|| format!("image-{}", short_hash(origin_url)));
    if !name.contains('.') {
        if let Some(ext) = extension_for(content_type) {
            name.push('.');
            name.push_str(ext);
        }
    }
    name
}

/// Persist a downloaded resource as an asset attributed to `owner`, with the
/// origin URL recorded as provenance. Validation failures from the store are
/// logged and absorbed; they are a per-candidate outcome, not a run failure.
pub fn create_asset(
    store: &dyn MessageStore,
    download: &TempDownload,
    origin_url: &str,
    owner: UserId,
) -> Option<Asset> {
    let filename = filename_for(origin_url, download.content_type.as_deref());
    match store.create_upload(owner, origin_url, &filename, download) {
        Ok(asset) => Some(asset),
        Err(reasons) => {
            log::info!(
                "upload validation failed for {origin_url}: {}",
                reasons.join(", ")
            );
            None
        }
    }
}

fn sanitize(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    // Collapse multiple underscores
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    let mut final_name = compacted;
    if final_name.len() > MAX_NAME_LEN {
        let mut cut = MAX_NAME_LEN;
        while !final_name.is_char_boundary(cut) {
            cut -= 1;
        }
        final_name.truncate(cut);
    }
    if is_reserved_windows_name(&final_name) {
        final_name.push('_');
    }
    final_name
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn extension_for(content_type: Option<&str>) -> Option<&'static str> {
    let ct = content_type?;
    let ct = ct.split(';').next().unwrap_or(ct).trim();
    match ct.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/avif" => Some("avif"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
