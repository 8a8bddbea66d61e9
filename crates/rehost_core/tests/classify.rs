use rehost_core::{is_eligible, RehostConfig};

fn config() -> RehostConfig {
    RehostConfig {
        base_url: "https://chat.example.com".to_string(),
        local_bases: vec![
            "https://chat.example.com".to_string(),
            "https://assets.example.com".to_string(),
        ],
        ..RehostConfig::default()
    }
}

fn no_uploads(_: &str) -> bool {
    false
}

#[test]
fn blank_input_is_rejected() {
    assert!(!is_eligible("", &config(), no_uploads));
    assert!(!is_eligible("   ", &config(), no_uploads));
}

#[test]
fn local_base_prefixes_are_rejected() {
    let cfg = config();
    assert!(!is_eligible(
        "https://chat.example.com/uploads/1/pic.png",
        &cfg,
        no_uploads
    ));
    assert!(!is_eligible(
        "https://assets.example.com/emoji/smile.png",
        &cfg,
        no_uploads
    ));
}

#[test]
fn absolute_path_urls_are_already_same_origin() {
    assert!(!is_eligible("/uploads/1/pic.png", &config(), no_uploads));
}

#[test]
fn known_uploads_are_rejected() {
    let cfg = config();
    let known = |src: &str| src.contains("/uploads/");
    assert!(!is_eligible(
        "https://mirror.example.net/uploads/1/pic.png",
        &cfg,
        known
    ));
}

#[test]
fn relative_and_unparseable_urls_are_rejected() {
    let cfg = config();
    assert!(!is_eligible("pic.png", &cfg, no_uploads));
    assert!(!is_eligible("//cdn.example.net/pic.png", &cfg, no_uploads));
    assert!(!is_eligible("mailto:someone@example.com", &cfg, no_uploads));
}

#[test]
fn blocked_domains_and_their_subdomains_are_rejected() {
    let mut cfg = config();
    cfg.blocked_domains = vec!["tracker.example.net".to_string()];
    assert!(!is_eligible(
        "https://tracker.example.net/pixel.png",
        &cfg,
        no_uploads
    ));
    assert!(!is_eligible(
        "https://cdn.tracker.example.net/pixel.png",
        &cfg,
        no_uploads
    ));
    assert!(is_eligible(
        "https://images.example.org/pic.png",
        &cfg,
        no_uploads
    ));
}

#[test]
fn remote_image_urls_are_eligible() {
    assert!(is_eligible(
        "http://cdn.example.org/a.png",
        &config(),
        no_uploads
    ));
}
