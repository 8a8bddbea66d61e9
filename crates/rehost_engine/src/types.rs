use std::fmt;

use thiserror::Error;

pub type MessageId = u64;
pub type ChannelId = u64;
pub type UserId = u64;
pub type AssetId = u64;

/// A chat message as seen through the storage boundary.
///
/// `cooked` is the rendered markup derived from `raw`; the store regenerates
/// it whenever the raw text is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub raw: String,
    pub cooked: String,
    pub trashed: bool,
}

/// A locally stored copy of a downloaded remote image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: AssetId,
    /// The remote URL this asset was downloaded from.
    pub origin_url: String,
    /// The local URL future renders should use instead.
    pub url: String,
    pub persisted: bool,
}

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// One of the feature flags is off; nothing was touched.
    Disabled,
    MessageMissing,
    ChannelMissing,
    MessageTrashed,
    /// No candidate resulted in a stored asset.
    NothingDownloaded,
    /// Assets may have been created, but the raw text did not change.
    Unchanged,
    /// Raw text was rewritten, re-rendered, persisted and announced.
    Updated,
}

/// Run-level failures. Per-candidate problems are logged and absorbed; only
/// bad trigger input and storage write failures surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RehostError {
    #[error("invalid trigger parameter: {0}")]
    InvalidParameter(String),
    #[error("storage rejected update for message {message_id}: {message}")]
    Storage {
        message_id: MessageId,
        message: String,
    },
}

/// Completion events surfaced by the trigger queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RehostEvent {
    RunCompleted {
        message_id: MessageId,
        result: Result<RunOutcome, RehostError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    Io,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::Io => write!(f, "io error"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
