use thiserror::Error;

/// Errors produced by the captcha engine
#[derive(Debug, Error)]
pub enum SolverError {
    /// A descriptor failed to re-resolve, or an element required at injection
    /// time is no longer present in the document
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A challenge is missing data required to request a solution
    /// (no site key, no image payload)
    #[error("Missing challenge data: {0}")]
    MissingChallengeData(String),

    /// The solving backend returned a failure or a malformed response
    #[error("Provider error: {0}")]
    Provider(String),

    /// An unexpected failure affecting a whole detection/solve/injection pass
    #[error("Pass failed: {0}")]
    Pass(String),

    /// A script evaluated in page context failed
    #[error("Script evaluation failed: {0}")]
    ScriptFailed(String),

    /// The page snapshot could not be extracted or parsed
    #[error("Snapshot extraction failed: {0}")]
    SnapshotFailed(String),

    /// A proxy server string could not be parsed
    #[error("Invalid proxy configuration: {0}")]
    InvalidProxy(String),
}

/// Result type alias for captcha engine operations
pub type Result<T> = std::result::Result<T, SolverError>;
