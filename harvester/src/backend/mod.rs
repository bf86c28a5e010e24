//! Collaborators of the harvest scheduler.
//!
//! The scheduler only sees these traits. [`BackendClient`] implements all of
//! them against backend peers over HTTP; tests provide in-memory doubles.

pub mod client;
pub mod errors;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::timeline::Timeline;

pub use client::BackendClient;
pub use errors::BackendError;
pub use types::{Explore, FetchRequest, PushReceipt, SuggestRequest, SuggestResult};

/// Supplies candidate fresh queries and the size of the backend backlog.
#[async_trait]
pub trait QuerySuggester: Send + Sync + 'static {
    async fn suggest(&self, req: &SuggestRequest) -> anyhow::Result<SuggestResult>;
}

/// Recent cached items, used to seed context when nothing else is available.
#[async_trait]
pub trait RecentSearch: Send + Sync + 'static {
    async fn search_recent(&self, limit: usize, timeout: Duration) -> anyhow::Result<Timeline>;
}

/// Turns a query into a batch of result items.
///
/// `None` covers both "no results" and "fetch failed"; the scheduler treats
/// them the same way.
#[async_trait]
pub trait Scraper: Send + Sync + 'static {
    async fn fetch(&self, req: &FetchRequest) -> Option<Timeline>;
}

/// Delivers a query-tagged batch to one backend target.
#[async_trait]
pub trait Pusher: Send + Sync + 'static {
    async fn push(&self, target: &str, timeline: &Timeline) -> anyhow::Result<PushReceipt>;
}
