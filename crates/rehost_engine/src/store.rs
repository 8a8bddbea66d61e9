use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::fetch::TempDownload;
use crate::types::{Asset, AssetId, ChannelId, Message, MessageId, UserId};

/// Storage boundary the pipeline calls through.
///
/// The core never assumes a persistence technology; it needs CRUD with
/// identifiers, the message->channel lookup, and idempotent message<->asset
/// associations. Embedders implement this against their real store.
pub trait MessageStore: Send + Sync {
    fn message(&self, id: MessageId) -> Option<Message>;
    fn channel_exists(&self, id: ChannelId) -> bool;
    /// Update the raw text, regenerate the rendered markup and persist.
    fn save_raw(&self, id: MessageId, raw: &str) -> Result<(), String>;
    /// Persist a downloaded resource as an asset. `Err` carries the
    /// validation failure reasons.
    fn create_upload(
        &self,
        owner: UserId,
        origin_url: &str,
        filename: &str,
        download: &TempDownload,
    ) -> Result<Asset, Vec<String>>;
    /// Recognize a URL as one of our own stored assets.
    fn upload_for_url(&self, url: &str) -> Option<Asset>;
    /// Attach an asset to a message. Attaching the same asset twice is a
    /// no-op.
    fn associate(&self, message_id: MessageId, asset_id: AssetId);
    fn associations(&self, message_id: MessageId) -> Vec<AssetId>;
}

/// Notification boundary: announce an updated message to its channel.
pub trait Notifier: Send + Sync {
    fn message_updated(&self, channel_id: ChannelId, message: &Message);
}

type RenderFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// In-memory [`MessageStore`] with a pluggable renderer, used by tests and
/// small embedders.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    render: RenderFn,
}

#[derive(Default)]
struct Inner {
    messages: HashMap<MessageId, Message>,
    channels: HashSet<ChannelId>,
    assets: HashMap<AssetId, Asset>,
    associations: HashMap<MessageId, Vec<AssetId>>,
    next_asset_id: AssetId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_renderer(Box::new(render_markdown_images))
    }

    pub fn with_renderer(render: RenderFn) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            render,
        }
    }

    pub fn add_channel(&self, id: ChannelId) {
        self.lock_inner().channels.insert(id);
    }

    /// Insert a message, rendering its markup from the raw text.
    pub fn insert_message(&self, id: MessageId, channel_id: ChannelId, user_id: UserId, raw: &str) {
        let cooked = (self.render)(raw);
        self.lock_inner().messages.insert(
            id,
            Message {
                id,
                channel_id,
                user_id,
                raw: raw.to_string(),
                cooked,
                trashed: false,
            },
        );
    }

    pub fn trash_message(&self, id: MessageId) {
        if let Some(message) = self.lock_inner().messages.get_mut(&id) {
            message.trashed = true;
        }
    }

    pub fn assets(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.lock_inner().assets.values().cloned().collect();
        assets.sort_by_key(|asset| asset.id);
        assets
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore for MemoryStore {
    fn message(&self, id: MessageId) -> Option<Message> {
        self.lock_inner().messages.get(&id).cloned()
    }

    fn channel_exists(&self, id: ChannelId) -> bool {
        self.lock_inner().channels.contains(&id)
    }

    fn save_raw(&self, id: MessageId, raw: &str) -> Result<(), String> {
        let cooked = (self.render)(raw);
        let mut inner = self.lock_inner();
        let message = inner
            .messages
            .get_mut(&id)
            .ok_or_else(|| format!("no message {id}"))?;
        message.raw = raw.to_string();
        message.cooked = cooked;
        Ok(())
    }

    fn create_upload(
        &self,
        _owner: UserId,
        origin_url: &str,
        filename: &str,
        download: &TempDownload,
    ) -> Result<Asset, Vec<String>> {
        let mut reasons = Vec::new();
        if filename.is_empty() {
            reasons.push("filename is blank".to_string());
        }
        if download.byte_len == 0 {
            reasons.push("file is empty".to_string());
        }
        if !reasons.is_empty() {
            return Err(reasons);
        }
        let mut inner = self.lock_inner();
        inner.next_asset_id += 1;
        let id = inner.next_asset_id;
        let asset = Asset {
            id,
            origin_url: origin_url.to_string(),
            url: format!("/uploads/{id}/{filename}"),
            persisted: true,
        };
        inner.assets.insert(id, asset.clone());
        Ok(asset)
    }

    fn upload_for_url(&self, url: &str) -> Option<Asset> {
        self.lock_inner()
            .assets
            .values()
            .find(|asset| asset.url == url)
            .cloned()
    }

    fn associate(&self, message_id: MessageId, asset_id: AssetId) {
        let mut inner = self.lock_inner();
        let assets = inner.associations.entry(message_id).or_default();
        if !assets.contains(&asset_id) {
            assets.push(asset_id);
        }
    }

    fn associations(&self, message_id: MessageId) -> Vec<AssetId> {
        self.lock_inner()
            .associations
            .get(&message_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Notifier that records every announcement, for assertions in tests.
#[derive(Default)]
pub struct MemoryNotifier {
    updates: Mutex<Vec<(ChannelId, MessageId)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<(ChannelId, MessageId)> {
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Notifier for MemoryNotifier {
    fn message_updated(&self, channel_id: ChannelId, message: &Message) {
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((channel_id, message.id));
    }
}

/// Minimal markdown-image rendering, enough to keep the raw/markup
/// invariant intact for in-memory messages: `![alt](src)` becomes an
/// `<img>` tag, everything else passes through per line.
fn render_markdown_images(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for line in raw.lines() {
        out.push_str("<p>");
        let mut rest = line;
        while let Some(start) = rest.find("![") {
            let Some(mid) = rest[start..].find("](").map(|i| start + i) else {
                break;
            };
            let Some(end) = rest[mid..].find(')').map(|i| mid + i) else {
                break;
            };
            out.push_str(&rest[..start]);
            let src = &rest[mid + 2..end];
            out.push_str("<img src=\"");
            out.push_str(src);
            out.push_str("\">");
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        out.push_str("</p>\n");
    }
    out
}
