// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Diagnostic failed: {0}")]
    Diagnostic(#[from] crate::application::DiagnosticError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Diagnostic(e) => e.exit_code(),
            _ => crate::application::diagnostic::constants::EXIT_FAILURE,
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn test_every_error_exits_with_failure() {
        assert_eq!(AppError::Config("bad".to_string()).exit_code(), 2);
        assert_eq!(
            AppError::from(DomainError::InvalidWait("-1".to_string())).exit_code(),
            2
        );
    }
}
