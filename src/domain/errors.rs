//! Domain errors for the Resonance refinement engine.

use thiserror::Error;

/// Errors raised by persistence and serialization underneath the engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// The single error type leaving the refinement loop controller.
///
/// Every variant renders to one user-visible message through
/// [`RefinementError::user_message`]; none of them leave session state
/// partially written.
#[derive(Debug, Error)]
pub enum RefinementError {
    /// Rejected locally before any network call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The evaluator or fix applier was unreachable or reported failure.
    #[error("Evaluator or fix service failed: {0}")]
    NetworkOrServer(String),

    /// The iteration budget is spent.
    #[error("Iteration limit reached: at most {max} refinement iterations per session")]
    IterationLimit { max: u32 },

    /// An insight cannot be applied as a fix.
    #[error("Fix unavailable for insight {insight_id}: {reason}")]
    FixUnavailable { insight_id: String, reason: String },

    /// Another operation is still in flight for this controller.
    #[error("Another analysis or fix operation is already in progress")]
    OperationInProgress,

    /// The persistence store failed.
    #[error("Session store error: {0}")]
    Store(#[from] DomainError),
}

impl RefinementError {
    /// Message suitable for direct display to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(reason) => reason.clone(),
            Self::NetworkOrServer(reason) => format!("Analysis service error: {reason}. Please try again."),
            Self::IterationLimit { max } => format!(
                "Maximum of {max} refinement iterations reached. Reset the session to start over."
            ),
            Self::FixUnavailable { reason, .. } => format!("This insight cannot be fixed automatically: {reason}"),
            Self::OperationInProgress => {
                "Please wait for the current operation to finish.".to_string()
            }
            Self::Store(err) => format!("Could not save session state: {err}"),
        }
    }

    /// Short machine-readable kind, used in logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NetworkOrServer(_) => "network_or_server",
            Self::IterationLimit { .. } => "iteration_limit",
            Self::FixUnavailable { .. } => "fix_unavailable",
            Self::OperationInProgress => "operation_in_progress",
            Self::Store(_) => "store",
        }
    }
}

pub type RefinementResult<T> = Result<T, RefinementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_readable() {
        let err = RefinementError::IterationLimit { max: 3 };
        assert!(err.user_message().contains("Maximum of 3"));
        assert_eq!(err.kind(), "iteration_limit");

        let err = RefinementError::FixUnavailable {
            insight_id: "i-9".to_string(),
            reason: "no fix section".to_string(),
        };
        assert!(err.user_message().contains("no fix section"));
    }

    #[test]
    fn test_domain_errors_convert_into_store_errors() {
        let err: RefinementError = DomainError::DatabaseError("locked".to_string()).into();
        assert!(matches!(err, RefinementError::Store(_)));
        assert_eq!(err.kind(), "store");
    }
}
