use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("push dispatcher is stopped; job for query {query:?} rejected")]
    DispatcherClosed { query: Option<String> },

    #[error("invalid configuration: {0}")]
    Config(String),
}
