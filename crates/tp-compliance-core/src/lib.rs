pub mod error;
pub mod types;

#[cfg(feature = "interest_limitation")]
pub mod interest_limitation;

pub use error::ComplianceError;
pub use types::*;

/// Standard result type for all compliance computations
pub type ComplianceResult<T> = Result<T, ComplianceError>;
