//! Convergence error taxonomy.

use thiserror::Error;

use crate::converge::drift::DispatchError;
use crate::files::{CommitError, ReloadError, VerifyError};
use crate::render::RenderError;

/// Errors that abort one convergence.
#[derive(Debug, Error)]
pub enum ConvergeError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Reload(#[from] ReloadError),
}

/// Result type for convergence operations.
pub type ConvergeResult<T> = Result<T, ConvergeError>;

impl ConvergeError {
    /// True when the controller must stop rather than wait for the next run.
    pub fn is_fatal(&self) -> bool {
        match self {
            ConvergeError::Reload(e) => e.is_fatal(),
            _ => false,
        }
    }

    /// Stage the convergence was in when it failed.
    pub fn stage(&self) -> &'static str {
        match self {
            ConvergeError::Render(_) => "render",
            ConvergeError::Verify(_) => "verify",
            ConvergeError::Dispatch(_) => "update_backends",
            ConvergeError::Commit(_) => "commit",
            ConvergeError::Reload(_) => "reload",
        }
    }
}
