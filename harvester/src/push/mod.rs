pub mod dispatcher;
pub mod types;

pub use dispatcher::PushDispatcher;
pub use types::PushJob;
