use thiserror::Error;

/// Failure talking to the recipe API
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("{endpoint} answered with HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum PuzzleError {
    #[error("no meal with a short enough name after {attempts} attempts")]
    NoQualifyingCandidate { attempts: usize },
}
