//! Query observers for views.
//!
//! Inspired by TanStack Query, `Query<T>` is what a view holds to read one cache key:
//! it subscribes to the shared [`QueryClient`] entry, and the view polls it on every
//! tick to learn whether a new snapshot arrived.
//!
//! # Example
//!
//! ```ignore
//! let api = api_client.clone();
//! let mut query = Query::new(cache.clone(), Deck::detail_key(&id), move || {
//!     let api = api.clone();
//!     let id = id.clone();
//!     async move { api.get_deck(&id).await }
//! });
//!
//! // Start fetching
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::future::Future;
use tokio::sync::oneshot;

use crate::cache::{
  erase_fetcher, Fetcher, QueryClient, QueryError, QueryKey, QueryStatus, QueryView, Subscription,
};

/// The state of a query as a view renders it
#[derive(Debug, Clone, Copy)]
pub enum QueryState<'a, T> {
  /// Query has not been started
  Idle,
  /// First fetch in progress, nothing to show yet
  Loading,
  /// Data available (possibly being refreshed in the background)
  Success(&'a T),
  /// Fetch failed after all retries
  Error(&'a str),
}

/// Observer for one cache key.
pub struct Query<T> {
  client: QueryClient,
  key: QueryKey,
  fetcher: Fetcher,
  subscription: Option<Subscription<T>>,
  view: QueryView<T>,
}

impl<T: Send + Sync + 'static> Query<T> {
  /// Create a query for `key`. Nothing is fetched until `fetch()`.
  pub fn new<F, Fut>(client: QueryClient, key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    Self {
      client,
      key,
      fetcher: erase_fetcher(fetcher),
      subscription: None,
      view: QueryView::default(),
    }
  }

  /// Get the current state of the query.
  pub fn state(&self) -> QueryState<'_, T> {
    if self.view.status == QueryStatus::Error {
      return QueryState::Error(self.error().unwrap_or("unknown error"));
    }
    if let Some(data) = self.view.data.as_deref() {
      return QueryState::Success(data);
    }
    match (&self.view.error, self.view.status) {
      // Data present but of another type
      (Some(e), QueryStatus::Success) => QueryState::Error(e.message()),
      _ if self.subscription.is_some() => QueryState::Loading,
      _ => QueryState::Idle,
    }
  }

  /// Get the data, including data kept from before a failed refetch.
  pub fn data(&self) -> Option<&T> {
    self.view.data.as_deref()
  }

  /// Check if the query has nothing to show yet and is fetching.
  pub fn is_loading(&self) -> bool {
    matches!(self.state(), QueryState::Loading)
  }

  /// Check if any fetch (first load or background refresh) is running.
  pub fn is_fetching(&self) -> bool {
    self.view.status == QueryStatus::Fetching
  }

  pub fn is_error(&self) -> bool {
    self.view.status == QueryStatus::Error
  }

  /// Get the error message of the last failed fetch.
  pub fn error(&self) -> Option<&str> {
    self.view.error.as_ref().map(|e| e.message())
  }

  /// When the data on screen was fetched or written.
  pub fn updated_at(&self) -> Option<DateTime<Utc>> {
    self.view.updated_at
  }

  /// Failed attempts of the fetch in progress; zero once it settles.
  pub fn retry_count(&self) -> u32 {
    self.view.retry_count
  }

  /// Subscribe to the key, fetching if the cache has no fresh data.
  ///
  /// This is a no-op if already subscribed.
  pub fn fetch(&mut self) {
    if self.subscription.is_some() {
      return;
    }
    let mut subscription = self.client.subscribe_with(&self.key, self.fetcher.clone());
    self.view = subscription.current();
    self.subscription = Some(subscription);
  }

  /// Force a refetch; current data is kept on screen until the new data lands.
  ///
  /// Marking the key stale first means an unsubscribed query fetches once, on subscribe.
  pub fn refetch(&mut self) {
    let subscribed = self.subscription.is_some();
    self.client.invalidate_queries(&self.key);
    if !subscribed {
      self.fetch();
    }
    self.poll();
  }

  /// Pick up the latest snapshot from the cache.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let Some(subscription) = self.subscription.as_mut() else {
      return false;
    };
    if !subscription.has_changed() {
      return false;
    }
    self.view = subscription.current();
    true
  }
}

impl<T> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("status", &self.view.status)
      .field("subscribed", &self.subscription.is_some())
      .finish_non_exhaustive()
  }
}

/// Outcome of a finished mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState<T> {
  Idle,
  Pending,
  Success(T),
  Error(String),
}

/// Handle to a write running in the background, polled like a query.
#[derive(Debug)]
pub struct Mutation<T> {
  state: MutationState<T>,
  receiver: Option<oneshot::Receiver<Result<T, String>>>,
}

impl<T> Default for Mutation<T> {
  fn default() -> Self {
    Self {
      state: MutationState::Idle,
      receiver: None,
    }
  }
}

impl<T: Send + 'static> Mutation<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_pending(&self) -> bool {
    matches!(self.state, MutationState::Pending)
  }

  /// Start `work`; a mutation already pending is superseded.
  pub fn start<Fut>(&mut self, work: Fut)
  where
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);
    self.state = MutationState::Pending;
    tokio::spawn(async move {
      let result = work
        .await
        .map_err(|e| QueryError::from_report(&e).to_string());
      // Ignore send errors - the view may have gone away
      let _ = tx.send(result);
    });
  }

  /// Returns `true` once, when the mutation finishes.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = self.receiver.as_mut() else {
      return false;
    };
    match receiver.try_recv() {
      Ok(Ok(value)) => self.state = MutationState::Success(value),
      Ok(Err(error)) => self.state = MutationState::Error(error),
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.state = MutationState::Error("Mutation was cancelled".to_string());
      }
    }
    self.receiver = None;
    true
  }

  /// Take the finished result, resetting to idle.
  pub fn take(&mut self) -> Option<Result<T, String>> {
    match std::mem::replace(&mut self.state, MutationState::Idle) {
      MutationState::Success(value) => Some(Ok(value)),
      MutationState::Error(error) => Some(Err(error)),
      other => {
        self.state = other;
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::QueryOptions;
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  fn key() -> QueryKey {
    QueryKey::from_segments(&["decks", "list"])
  }

  fn client() -> QueryClient {
    QueryClient::new(QueryOptions {
      retry: crate::cache::RetryPolicy::new(0),
      ..QueryOptions::default()
    })
  }

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(client(), key(), || async { Ok(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(matches!(query.state(), QueryState::Success(_)));
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
    assert!(query.updated_at().is_some());
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> =
      Query::new(client(), key(), || async { Err(eyre!("Something went wrong")) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_fetch_while_subscribed_is_noop() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(client(), key(), move || {
      let counter = counter.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    query.fetch();
    tokio::time::sleep(Duration::from_millis(50)).await;
    query.poll();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_two_queries_on_one_key_share_data() {
    let cache = client();
    let calls = Arc::new(AtomicU32::new(0));
    let make = |calls: Arc<AtomicU32>| {
      move || {
        let calls = calls.clone();
        async move {
          tokio::time::sleep(Duration::from_millis(5)).await;
          Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
        }
      }
    };

    let mut a = Query::new(cache.clone(), key(), make(calls.clone()));
    let mut b = Query::new(cache.clone(), key(), make(calls.clone()));
    a.fetch();
    b.fetch();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(a.poll());
    assert!(b.poll());
    assert_eq!(a.data(), Some(&1));
    assert_eq!(b.data(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_keeps_data_until_new_lands() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(client(), key(), move || {
      let counter = counter.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(30)).await;
    query.poll();
    assert_eq!(query.data(), Some(&0));

    query.refetch();
    assert!(query.is_fetching());
    assert_eq!(query.data(), Some(&0));

    tokio::time::sleep(Duration::from_millis(30)).await;
    query.poll();
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_refetch_before_fetch_hits_network_once() {
    let cache = client();
    cache.set_query_data(&key(), 7u32);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(cache, key(), move || {
      let counter = counter.clone();
      async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 100) }
    });

    query.refetch();
    assert_eq!(query.data(), Some(&7), "cached data shown while refetching");
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(query.data(), Some(&100));
  }

  #[tokio::test(start_paused = true)]
  async fn test_retry_count_visible_while_retrying() {
    let cache = QueryClient::new(QueryOptions {
      retry: crate::cache::RetryPolicy::new(2),
      ..QueryOptions::default()
    });
    let mut query: Query<u32> =
      Query::new(cache, key(), || async { Err(eyre!("connection refused")) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert!(query.is_loading());
    assert_eq!(query.retry_count(), 1);
  }

  #[tokio::test]
  async fn test_mutation_success_and_take() {
    let mut mutation = Mutation::new();
    mutation.start(async { Ok::<_, color_eyre::Report>("created") });
    assert!(mutation.is_pending());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(mutation.poll());
    assert_eq!(mutation.take(), Some(Ok("created")));
    assert_eq!(mutation.state, MutationState::Idle);
    assert!(!mutation.poll());
  }

  #[tokio::test]
  async fn test_mutation_error() {
    let mut mutation: Mutation<()> = Mutation::new();
    mutation.start(async { Err(eyre!("409 Conflict")) });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(mutation.poll());
    assert_eq!(mutation.take(), Some(Err("409 Conflict".to_string())));
  }
}
