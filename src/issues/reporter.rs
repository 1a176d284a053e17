//! Error reporting collaborator
//!
//! The issue state hands every caught failure to an [`ErrorReporter`] instead
//! of propagating it to the presentation layer. How the message is shown is up
//! to the implementation.

use super::error::IssueError;

pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str, error: Option<&IssueError>);
}

/// Reports failures as `tracing` error events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, message: &str, error: Option<&IssueError>) {
        match error {
            Some(err) => tracing::error!(kind = %err.kind(), "{}: {}", message, err),
            None => tracing::error!("{}", message),
        }
    }
}
