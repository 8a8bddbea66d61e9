//! Rehost engine: IO pipeline that mirrors hotlinked chat images locally.
mod asset;
mod engine;
mod fetch;
mod lock;
mod run;
mod scan;
mod store;
mod types;

pub use asset::{create_asset, filename_for};
pub use engine::RehostHandle;
pub use fetch::{fetch_with_retries, FetchSettings, Fetcher, ReqwestFetcher, TempDownload};
pub use lock::{LockGuard, MemoryLocks, RunLock};
pub use run::Rehoster;
pub use scan::{extract_candidates, Candidate, CandidateKind};
pub use store::{MemoryNotifier, MemoryStore, MessageStore, Notifier};
pub use types::{
    Asset, AssetId, ChannelId, FailureKind, FetchError, Message, MessageId, RehostError,
    RehostEvent, RunOutcome, UserId,
};
