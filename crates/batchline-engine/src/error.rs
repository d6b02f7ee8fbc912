//! Engine error type: domain precondition failures vs. repository faults.

use thiserror::Error;

/// An error returned by a state-machine operation.
///
/// Expected precondition failures (`Domain`) are part of the API contract
/// and are matched on by callers; repository faults are opaque
/// infrastructure errors and simply propagate.
#[derive(Debug, Error)]
pub enum EngineError<E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  #[error(transparent)]
  Domain(#[from] batchline_core::Error),

  #[error("repository error: {0}")]
  Repository(#[source] E),
}

impl<E> EngineError<E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  /// The domain error, if this is one. Convenience for tests and callers
  /// that only branch on precondition failures.
  pub fn as_domain(&self) -> Option<&batchline_core::Error> {
    match self {
      Self::Domain(e) => Some(e),
      Self::Repository(_) => None,
    }
  }
}
