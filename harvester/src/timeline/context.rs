//! Derivation of context terms from result items.
//!
//! A context term is a search key discovered inside a result: one
//! `from:<user>` term per mentioned user, then every hashtag verbatim.

use super::types::Message;

pub const MENTION_PREFIX: &str = "from:";

/// Context terms carried by a single message, in discovery order.
pub fn context_terms(message: &Message) -> impl Iterator<Item = String> + '_ {
    message
        .mentions
        .iter()
        .map(|user| format!("{MENTION_PREFIX}{user}"))
        .chain(message.hashtags.iter().cloned())
}
