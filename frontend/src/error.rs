use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("push channel closed")]
    ChannelClosed,

    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("config: {0}")]
    Config(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
