//! Bounded in-memory collections driving the harvest scheduler.
//!
//! - [`QueryBacklog`]: fresh queries from the backend, awaiting a fetch.
//! - [`ContextFrontier`]: discovered context terms awaiting replay, plus the
//!   set of terms already used as a fetch key.

pub mod backlog;
pub mod context;

pub use backlog::QueryBacklog;
pub use context::ContextFrontier;
