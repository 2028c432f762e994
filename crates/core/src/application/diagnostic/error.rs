// Diagnostic run failures

use super::constants::EXIT_FAILURE;
use crate::port::{AttachError, InjectError};
use std::path::PathBuf;
use thiserror::Error;

/// Everything that fails a run
///
/// Errors raised inside the target after a successful load are not here: they
/// arrive as messages and never fail the run.
#[derive(Error, Debug)]
pub enum DiagnosticError {
    #[error("Script file not found: {}", .0.display())]
    ScriptMissing(PathBuf),

    #[error("Cannot read script file {}: {source}", .path.display())]
    ScriptUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Process not found: {0} (start the target program before running --diag)")]
    ProcessNotFound(String),

    #[error("Attach failed: {0}")]
    Attach(String),

    #[error("Injection failed: {0}")]
    Inject(#[from] InjectError),
}

impl DiagnosticError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }

    /// True for failures detected before any contact with the target
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DiagnosticError::ScriptMissing(_) | DiagnosticError::ScriptUnreadable { .. }
        )
    }
}

impl From<AttachError> for DiagnosticError {
    fn from(err: AttachError) -> Self {
        match err {
            AttachError::ProcessNotFound(name) => DiagnosticError::ProcessNotFound(name),
            AttachError::Backend(msg) => DiagnosticError::Attach(msg),
        }
    }
}
