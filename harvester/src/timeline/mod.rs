pub mod context;
pub mod types;

pub use context::context_terms;
pub use types::{Message, Order, Timeline};
