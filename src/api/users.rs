//! Per-user state kept by the backend: completed problems.

use color_eyre::{eyre::WrapErr, Result};
use std::sync::Arc;

use super::client::ApiClient;
use super::types::ProblemsCompleted;
use crate::cache::{retry_with_backoff, QueryClient, QueryKey, Subscription};

#[derive(Clone)]
pub struct UserService {
  api: ApiClient,
  cache: QueryClient,
}

impl UserService {
  pub fn new(api: ApiClient, cache: QueryClient) -> Self {
    Self { api, cache }
  }

  /// `["users", "problems-completed"]`
  pub fn completed_key() -> QueryKey {
    QueryKey::from_segments(&["users", "problems-completed"])
  }

  /// Completed problems as last reported by the backend. The list only arrives with
  /// update responses, so holding this keeps it from being collected.
  pub fn watch_completed(&self) -> Subscription<ProblemsCompleted> {
    self.cache.observe(&Self::completed_key())
  }

  /// Record completion and store the returned list in the cache.
  pub async fn set_completed(
    &self,
    problem_id: u32,
    completed: bool,
  ) -> Result<Arc<ProblemsCompleted>> {
    let policy = self.cache.options().mutation_retry;
    let response = retry_with_backoff(policy, "update completed problems", || {
      self.api.set_problem_completed(problem_id, completed)
    })
    .await
    .wrap_err_with(|| format!("Problem {} was not updated", problem_id))?;

    let response = Arc::new(response);
    self
      .cache
      .set_query_data(&Self::completed_key(), ProblemsCompleted::clone(&response));
    Ok(response)
  }
}
