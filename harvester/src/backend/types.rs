use serde::{Deserialize, Serialize};

use crate::timeline::{Message, Order};

/// Arguments of a suggestion lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestRequest {
    /// Query prefix; empty matches every stored query.
    pub query: String,
    /// Suggestion source on the backend (`query` = stored query index).
    pub source: String,
    /// Number of candidates the backend considers.
    pub count: u64,
    pub order_ascending: bool,
    pub order_by: String,
    /// Minutes to add to local time to get UTC.
    pub timezone_offset: i32,
    pub since: Option<String>,
    pub until: Option<String>,
    /// Field the time window applies to.
    pub select_by: String,
    /// Number of candidates returned, picked at random from `count`.
    pub random: u64,
}

impl SuggestRequest {
    /// Lookup used to refill the query backlog: every query whose next
    /// retrieval is due, soonest first.
    pub fn due_for_retrieval(fetch_size: u64, multiplier: u64, timezone_offset: i32) -> Self {
        Self {
            query: String::new(),
            source: "query".into(),
            count: fetch_size.saturating_mul(multiplier),
            order_ascending: true,
            order_by: "retrieval_next".into(),
            timezone_offset,
            since: None,
            until: Some("now".into()),
            select_by: "retrieval_next".into(),
            random: fetch_size,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SuggestResult {
    pub queries: Vec<String>,
    /// Total number of matching queries on the backend.
    pub hits: u64,
}

/// Ranking of the context terms a fetch surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Explore {
    /// Surfaced terms are explored before older ones.
    First,
    /// Surfaced terms wait behind older ones.
    Last,
}

impl Explore {
    pub fn as_param(&self) -> &'static str {
        match self {
            Explore::First => "first",
            Explore::Last => "last",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub query: String,
    pub order: Order,
    /// Full timeline mode: fetch complete item detail.
    pub full_detail: bool,
    pub explore: Explore,
    pub max_items: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PushReceipt {
    pub records: u64,
    pub new: u64,
}

// =========================
// Wire envelopes
// =========================

#[derive(Debug, Deserialize)]
pub struct SuggestEnvelope {
    #[serde(default)]
    pub search_metadata: SuggestMetadata,
    #[serde(default)]
    pub queries: Vec<QueryEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestMetadata {
    #[serde(default)]
    pub hits: u64,
}

#[derive(Debug, Deserialize)]
pub struct QueryEntry {
    pub query: String,
}

impl From<SuggestEnvelope> for SuggestResult {
    fn from(env: SuggestEnvelope) -> Self {
        Self {
            queries: env.queries.into_iter().map(|q| q.query).collect(),
            hits: env.search_metadata.hits,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchEnvelope {
    #[serde(default)]
    pub statuses: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct PushPayload<'a> {
    pub search_metadata: PushMetadata<'a>,
    pub statuses: &'a [Message],
}

#[derive(Debug, Serialize)]
pub struct PushMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<&'a str>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct PushResponse {
    pub status: String,
    #[serde(default)]
    pub records: u64,
    #[serde(default)]
    pub new: u64,
    #[serde(default)]
    pub message: String,
}
