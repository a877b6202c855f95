use thiserror::Error;

/// Terminal failure of one ingestion cycle. Never retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("retrieval failed: {0}")]
    RetrievalFailure(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("header row {row} does not exist (sheet has {available} rows)")]
    InvalidHeaderRow { row: usize, available: usize },

    #[error(
        "no date columns found in the header row; expected labels like 01/02, 2/2 or 2026-02-01"
    )]
    NoDateColumns,

    #[error("invalid date in header {label:?}: {reason}")]
    InvalidDate { label: String, reason: String },

    #[error("retrieval cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Network, permission or non-tabular payload, as opposed to a parse-side failure.
    pub fn is_retrieval(&self) -> bool {
        matches!(self, Self::RetrievalFailure(_))
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        Self::RetrievalFailure(e.to_string())
    }
}
