//! Session-scoped state. A session is one run of the program.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Session {
  started_at: DateTime<Utc>,
  visited: bool,
}

impl Default for Session {
  fn default() -> Self {
    Self::new()
  }
}

impl Session {
  /// Start a fresh session; the visited flag starts cleared.
  pub fn new() -> Self {
    Self {
      started_at: Utc::now(),
      visited: false,
    }
  }

  pub fn started_at(&self) -> DateTime<Utc> {
    self.started_at
  }

  /// Set the visited flag. Returns true only the first time in this session.
  pub fn mark_visited(&mut self) -> bool {
    !std::mem::replace(&mut self.visited, true)
  }
}
