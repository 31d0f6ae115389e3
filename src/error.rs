use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Missing substitution for placeholder ${0}")]
    MissingSubstitution(String),

    #[error("Query failed with status {status}: {body}")]
    QueryFailed {
        status: u16,
        body: String,
        query: Option<String>,
    },

    #[error("All {attempts} retry attempts timed out")]
    RetriesExhausted { attempts: u32 },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for failures the remote answered: non-200 status, GraphQL-level
    /// errors, or an unparsable body. Miners downgrade these to a
    /// "does not exist" sentinel; everything else becomes "unknown failure".
    pub fn is_query_failure(&self) -> bool {
        matches!(self, Error::QueryFailed { .. })
    }
}
