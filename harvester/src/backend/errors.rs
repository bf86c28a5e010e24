use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payload encoding error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("peer {peer} rejected push: {message}")]
    Rejected { peer: String, message: String },

    #[error("no backend peer configured")]
    NoPeers,
}
