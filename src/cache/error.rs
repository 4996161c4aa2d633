//! Fetch errors shared by every waiter of one request.

use std::fmt;
use std::sync::Arc;

/// Error recorded on a cache entry.
///
/// Cloneable because one failed fetch is handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
  message: Arc<str>,
}

impl QueryError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: Arc::from(message.into()),
    }
  }

  /// Flatten an eyre report (including its cause chain) into a message.
  pub fn from_report(report: &color_eyre::Report) -> Self {
    let message = report
      .chain()
      .map(|cause| cause.to_string())
      .collect::<Vec<_>>()
      .join(": ");
    Self::new(message)
  }

  pub(crate) fn type_mismatch(key: &str, expected: &str) -> Self {
    Self::new(format!(
      "Cached value for {} is not a {}",
      key, expected
    ))
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

impl fmt::Display for QueryError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.message)
  }
}

impl std::error::Error for QueryError {}
