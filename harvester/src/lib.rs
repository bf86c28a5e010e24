pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod frontier;
pub mod metrics;
pub mod push;
pub mod scheduler;
pub mod timeline;
