use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited on {endpoint} (retry after {retry_after_secs}s)")]
    RateLimited {
        endpoint: String,
        retry_after_secs: u64,
    },

    #[error("authentication failed: {detail}")]
    Unauthorized { detail: String },

    #[error("unexpected HTTP status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },

    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("subscription transport error: {detail}")]
    Transport { detail: String },

    #[error("session sink failure: {0}")]
    Sink(#[source] crate::collector::SinkError),
}
