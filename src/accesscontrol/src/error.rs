//! Error types for the access-control layer

use thiserror::Error;

/// Failure while expanding an abstract scope into canonical scopes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Scope is malformed or outside the resolver's prefix
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Scope was well formed but the entity it names does not exist
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Backing store could not be reached
    #[error("Resolution unavailable: {0}")]
    Unavailable(String),

    /// Caller cancelled the request or its deadline passed
    #[error("Resolution cancelled")]
    Cancelled,
}

/// Access-control errors
#[derive(Debug, Error)]
pub enum AccessControlError {
    /// Scope resolution failed while evaluating
    #[error("Evaluation failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// Permission store could not return the caller's permissions
    #[error("Permission store error: {0}")]
    PermissionStore(String),

    /// Startup registration conflict or invalid declaration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Background task stopped by its cancellation signal
    #[error("Background task cancelled")]
    Cancelled,

    /// Settings file could not be parsed
    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AccessControlError {
    /// True when the error means a referenced entity is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Resolution(ResolutionError::EntityNotFound(_)))
    }

    /// True for request cancellation as well as background task cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Resolution(ResolutionError::Cancelled)
        )
    }
}

/// Result type for access-control operations
pub type Result<T> = std::result::Result<T, AccessControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_errors_are_distinct() {
        let not_found = AccessControlError::from(ResolutionError::EntityNotFound("x".into()));
        let invalid = AccessControlError::from(ResolutionError::InvalidScope("x".into()));
        let cancelled = AccessControlError::from(ResolutionError::Cancelled);

        assert!(not_found.is_not_found());
        assert!(!invalid.is_not_found());
        assert!(!cancelled.is_not_found());
        assert!(cancelled.is_cancelled());
        assert!(AccessControlError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_error_messages() {
        let err = AccessControlError::Configuration("duplicate prefix".into());
        assert_eq!(err.to_string(), "Configuration error: duplicate prefix");

        let err = AccessControlError::from(ResolutionError::EntityNotFound("plugins:id:foo".into()));
        assert_eq!(err.to_string(), "Evaluation failed: Entity not found: plugins:id:foo");
    }
}
