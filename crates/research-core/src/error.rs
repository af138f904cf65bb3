use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResearchError {
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream rejected credentials: {0}")]
    UpstreamUnauthorized(String),

    #[error("Mention scrape failed: {0}")]
    ScrapeFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Report generation failed: {0}")]
    ReportGenerationFailed(String),
}

impl ResearchError {
    /// True for failures that originate in an external collaborator rather
    /// than in the caller's input.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ResearchError::UpstreamUnavailable(_)
                | ResearchError::UpstreamUnauthorized(_)
                | ResearchError::ScrapeFailed(_)
                | ResearchError::Timeout(_)
        )
    }
}
