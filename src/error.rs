use crate::services::analysis::jobs::AnalysisJobError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The event has no boundary record in storage.
    #[error("event not found: {event_id}")]
    NotFound { event_id: String },
    #[error("invalid params: {0}")]
    Validation(String),
    #[error("time series fetch failed: {0}")]
    Fetch(String),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "invalid_params",
            Self::Fetch(_) => "fetch_failed",
            Self::Serialization(_) => "serialization_failed",
        }
    }

    pub fn to_job_error(&self) -> AnalysisJobError {
        let details = match self {
            Self::NotFound { event_id } => Some(serde_json::json!({ "event_id": event_id })),
            _ => None,
        };
        AnalysisJobError {
            code: self.code().to_string(),
            message: self.to_string(),
            details,
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "database error while fetching time series");
        Self::Fetch(err.to_string())
    }
}
