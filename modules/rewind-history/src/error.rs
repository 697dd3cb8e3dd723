use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("malformed lifted state: {0}")]
    MalformedSnapshot(String),

    #[error("malformed {kind} action: {source}")]
    MalformedLiftedAction {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;
