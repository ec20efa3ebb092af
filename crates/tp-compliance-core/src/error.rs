use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid assessment year: {0}")]
    InvalidAssessmentYear(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ComplianceError {
    fn from(e: serde_json::Error) -> Self {
        ComplianceError::SerializationError(e.to_string())
    }
}
