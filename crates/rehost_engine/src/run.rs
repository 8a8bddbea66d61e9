use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rehost_core::{is_eligible, normalize, rewrite, RehostConfig, ResolvedMap};
use rehost_logging::{rehost_debug, rehost_error, rehost_info};

use crate::asset::create_asset;
use crate::fetch::{fetch_with_retries, Fetcher};
use crate::lock::{LockGuard, MemoryLocks, RunLock};
use crate::scan::{extract_candidates, Candidate};
use crate::store::{MessageStore, Notifier};
use crate::types::{Asset, Message, MessageId, RehostError, RunOutcome};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// One-message-at-a-time orchestrator for the rehost pipeline.
///
/// Runs for different messages may proceed concurrently; runs for the same
/// message serialize through the per-message named lock.
pub struct Rehoster {
    config: RehostConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn MessageStore>,
    notifier: Arc<dyn Notifier>,
    locks: Arc<dyn RunLock>,
}

impl Rehoster {
    pub fn new(
        config: RehostConfig,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn MessageStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            fetcher,
            store,
            notifier,
            locks: Arc::new(MemoryLocks::new()),
        }
    }

    pub fn with_locks(mut self, locks: Arc<dyn RunLock>) -> Self {
        self.locks = locks;
        self
    }

    /// Execute one end-to-end pass for `message_id`.
    ///
    /// Early exits (flags off, missing message/channel, trashed message) are
    /// outcomes, not errors, and leave no side effects. Per-candidate
    /// failures never abort the pass; the message is mutated once at the
    /// end, and only when the rewritten raw text actually differs.
    pub async fn run(&self, message_id: MessageId) -> Result<RunOutcome, RehostError> {
        if !(self.config.enabled && self.config.chat_enabled) {
            return Ok(RunOutcome::Disabled);
        }
        let Some(message) = self.store.message(message_id) else {
            return Ok(RunOutcome::MessageMissing);
        };
        if !self.store.channel_exists(message.channel_id) {
            return Ok(RunOutcome::ChannelMissing);
        }
        if message.trashed {
            return Ok(RunOutcome::MessageTrashed);
        }

        if self.config.inline_execution {
            // The embedder guarantees non-overlapping execution.
            return self.run_exclusive(message_id).await;
        }
        let key = format!("rehost_message_{message_id}");
        let guard = self.acquire(&key).await;
        let result = self.run_exclusive(message_id).await;
        drop(guard);
        result
    }

    async fn acquire(&self, key: &str) -> LockGuard {
        loop {
            if let Some(guard) = self.locks.try_acquire(key, self.config.lock_ttl) {
                return guard;
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn run_exclusive(&self, message_id: MessageId) -> Result<RunOutcome, RehostError> {
        rehost_logging::set_run_message(message_id);
        let result = self.run_inner(message_id).await;
        rehost_logging::set_run_message(0);
        result
    }

    async fn run_inner(&self, message_id: MessageId) -> Result<RunOutcome, RehostError> {
        // Fresh snapshot now that the run is exclusive; an earlier run may
        // have rewritten the message while we waited for the lock.
        let Some(message) = self.store.message(message_id) else {
            return Ok(RunOutcome::MessageMissing);
        };
        if message.trashed {
            return Ok(RunOutcome::MessageTrashed);
        }

        let candidates = extract_candidates(&message.cooked);
        rehost_debug!("{} candidate reference(s)", candidates.len());

        let mut resolved: HashMap<String, Asset> = HashMap::new();
        for candidate in &candidates {
            if let Err(err) = self
                .process_candidate(&message, candidate, &mut resolved)
                .await
            {
                rehost_error!("failed to rehost {}: {err}", candidate.src);
            }
        }

        if resolved.is_empty() {
            return Ok(RunOutcome::NothingDownloaded);
        }

        let map: ResolvedMap = resolved
            .iter()
            .map(|(key, asset)| (key.clone(), asset.url.clone()))
            .collect();
        let new_raw = rewrite(&message.raw, &map);
        if new_raw == message.raw {
            return Ok(RunOutcome::Unchanged);
        }

        self.store
            .save_raw(message_id, &new_raw)
            .map_err(|message| RehostError::Storage {
                message_id,
                message,
            })?;
        if let Some(updated) = self.store.message(message_id) {
            self.notifier.message_updated(updated.channel_id, &updated);
        }
        rehost_info!("rewrote {} hotlinked image(s)", resolved.len());
        Ok(RunOutcome::Updated)
    }

    /// Handle a single candidate: classify, dedup, fetch, persist, associate.
    /// Every failure mode here is per-candidate and absorbed by the caller.
    async fn process_candidate(
        &self,
        message: &Message,
        candidate: &Candidate,
        resolved: &mut HashMap<String, Asset>,
    ) -> Result<(), RehostError> {
        let src = self.expand_scheme_relative(&candidate.src);
        if !is_eligible(&src, &self.config, |url| {
            self.store.upload_for_url(url).is_some()
        }) {
            return Ok(());
        }

        let key = normalize(&src);
        if resolved.contains_key(&key) {
            // First occurrence of this key already won the download.
            return Ok(());
        }

        let Some(download) = fetch_with_retries(
            self.fetcher.as_ref(),
            &src,
            self.config.retry_attempts,
            self.config.retry_backoff,
        )
        .await
        else {
            return Ok(());
        };

        if download.byte_len > self.config.max_bytes {
            rehost_info!(
                "skipping {src}: {} bytes exceeds the {} byte limit",
                download.byte_len,
                self.config.max_bytes
            );
            return Ok(());
        }

        let Some(asset) = create_asset(self.store.as_ref(), &download, &src, message.user_id)
        else {
            return Ok(());
        };
        self.store.associate(message.id, asset.id);
        resolved.insert(key, asset);
        Ok(())
    }

    fn expand_scheme_relative(&self, src: &str) -> String {
        let src = src.trim();
        if src.starts_with("//") {
            format!("{}:{src}", self.config.preferred_scheme)
        } else {
            src.to_string()
        }
    }
}
