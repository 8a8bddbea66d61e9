use std::time::Duration;

/// Per-run configuration for the rehost pipeline.
///
/// Resolved once when a run starts and never reloaded mid-run. Embedders map
/// their own settings store onto this struct; the defaults are usable as-is
/// for tests.
#[derive(Debug, Clone)]
pub struct RehostConfig {
    /// Global "rehost remote images" switch.
    pub enabled: bool,
    /// Plugin-level "enable for chat" switch.
    pub chat_enabled: bool,
    /// The site's own base URL, e.g. `https://chat.example.com`.
    pub base_url: String,
    /// URL prefixes considered local: the base URL, the asset host, the
    /// external emoji host. Candidates starting with any of these are never
    /// downloaded.
    pub local_bases: Vec<String>,
    /// Scheme used to expand scheme-relative (`//host/path`) sources.
    pub preferred_scheme: String,
    /// Maximum accepted download size in bytes.
    pub max_bytes: u64,
    /// Wall-clock timeout for a single fetch attempt.
    pub download_timeout: Duration,
    /// Total fetch attempts per candidate (first try included).
    pub retry_attempts: usize,
    /// Fixed delay between fetch attempts.
    pub retry_backoff: Duration,
    /// Domains (and their subdomains) the download policy rejects.
    pub blocked_domains: Vec<String>,
    /// Validity window of the per-message run lock.
    pub lock_ttl: Duration,
    /// When true the embedder guarantees synchronous, non-overlapping
    /// execution and the run lock is skipped entirely.
    pub inline_execution: bool,
}

impl Default for RehostConfig {
    fn default() -> Self {
        let base_url = "http://localhost".to_string();
        Self {
            enabled: true,
            chat_enabled: true,
            local_bases: vec![base_url.clone()],
            base_url,
            preferred_scheme: "http".to_string(),
            max_bytes: 4 * 1024 * 1024,
            download_timeout: Duration::from_secs(15),
            retry_attempts: 3,
            retry_backoff: Duration::from_secs(1),
            blocked_domains: Vec::new(),
            lock_ttl: Duration::from_secs(120),
            inline_execution: false,
        }
    }
}

impl RehostConfig {
    /// Site-wide download policy: the final say on whether a host may be
    /// fetched. A host matching a blocked domain, or sitting under one,
    /// is rejected.
    pub fn should_download(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        !self.blocked_domains.iter().any(|blocked| {
            let blocked = blocked.to_ascii_lowercase();
            host == blocked || host.ends_with(&format!(".{blocked}"))
        })
    }
}
