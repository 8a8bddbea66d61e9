//! Rehost core: pure URL decisions and raw-text rewriting.
mod classify;
mod config;
mod normalize;
mod rewrite;

pub use classify::is_eligible;
pub use config::RehostConfig;
pub use normalize::normalize;
pub use rewrite::{rewrite, ResolvedMap};
