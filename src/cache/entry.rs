//! Cache entries and the snapshots subscribers observe.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

use super::error::QueryError;
use super::key::QueryKey;

/// Type-erased cached payload. Typed access goes through `Arc::downcast`.
pub type AnyData = Arc<dyn Any + Send + Sync>;

pub(crate) type FetchOutcome = Result<AnyData, QueryError>;

/// A fetch in progress, shared by every caller that asked for the same key.
pub(crate) type InFlight = Shared<BoxFuture<'static, FetchOutcome>>;

/// Type-erased fetch function registered for a key.
pub(crate) type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, color_eyre::Result<AnyData>> + Send + Sync>;

/// Lifecycle status of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
  /// Created but never fetched
  #[default]
  Idle,
  /// A fetch is in flight (data, if any, is still served)
  Fetching,
  /// Last fetch succeeded
  Success,
  /// Retries exhausted; error retained until the next success
  Error,
}

/// Point-in-time view of an entry, published to subscribers on every change.
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshot {
  pub status: QueryStatus,
  pub data: Option<AnyData>,
  pub error: Option<QueryError>,
  pub updated_at: Option<DateTime<Utc>>,
  pub retry_count: u32,
}

pub(crate) struct CacheEntry {
  pub key: QueryKey,
  pub hash: String,
  pub data: Option<AnyData>,
  pub error: Option<QueryError>,
  pub status: QueryStatus,
  /// Last successful fetch or direct write
  pub fetched_at: Option<Instant>,
  pub updated_at: Option<DateTime<Utc>>,
  pub created_at: Instant,
  /// When the subscriber count last dropped to zero
  pub released_at: Option<Instant>,
  pub retry_count: u32,
  pub invalidated: bool,
  /// Bumped on every invalidation; a fetch that started under an older epoch
  /// lands as stale.
  pub epoch: u64,
  pub subscribers: usize,
  /// Distinguishes this entry from a later one stored under the same key.
  pub generation: u64,
  /// Bumped whenever a fetch starts or the entry is cleared; only the latest fetch may land.
  pub fetch_seq: u64,
  pub in_flight: Option<InFlight>,
  pub fetcher: Option<Fetcher>,
  pub notify: watch::Sender<QuerySnapshot>,
}

impl CacheEntry {
  pub fn new(key: QueryKey, generation: u64, now: Instant) -> Self {
    let (notify, _) = watch::channel(QuerySnapshot::default());
    Self {
      hash: key.hash(),
      key,
      data: None,
      error: None,
      status: QueryStatus::Idle,
      fetched_at: None,
      updated_at: None,
      created_at: now,
      released_at: None,
      retry_count: 0,
      invalidated: false,
      epoch: 0,
      subscribers: 0,
      generation,
      fetch_seq: 0,
      in_flight: None,
      fetcher: None,
      notify,
    }
  }

  pub fn is_stale(&self, now: Instant, stale_time: Duration) -> bool {
    if self.invalidated {
      return true;
    }
    match self.fetched_at {
      Some(fetched_at) => now.duration_since(fetched_at) >= stale_time,
      None => true,
    }
  }

  /// Earliest instant the entry may be evicted.
  pub fn expires_at(&self, gc_time: Duration) -> Instant {
    let last_fetch = self.fetched_at.unwrap_or(self.created_at);
    let anchor = match self.released_at {
      Some(released) if released > last_fetch => released,
      _ => last_fetch,
    };
    anchor + gc_time
  }

  pub fn is_evictable(&self, now: Instant, gc_time: Duration) -> bool {
    self.subscribers == 0 && self.in_flight.is_none() && now >= self.expires_at(gc_time)
  }

  pub fn snapshot(&self) -> QuerySnapshot {
    QuerySnapshot {
      status: self.status,
      data: self.data.clone(),
      error: self.error.clone(),
      updated_at: self.updated_at,
      retry_count: self.retry_count,
    }
  }

  /// Forget everything fetched so far, keeping subscribers and the fetch function.
  ///
  /// A fetch still in flight is orphaned: its result no longer matches `fetch_seq`.
  pub fn reset(&mut self) {
    self.data = None;
    self.error = None;
    self.status = QueryStatus::Idle;
    self.fetched_at = None;
    self.updated_at = None;
    self.retry_count = 0;
    self.invalidated = false;
    self.in_flight = None;
    self.fetch_seq += 1;
  }

  /// Push the current state to every subscriber at once.
  pub fn publish(&self) {
    self.notify.send_replace(self.snapshot());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(now: Instant) -> CacheEntry {
    CacheEntry::new(QueryKey::from_segments(&["decks", "list"]), 1, now)
  }

  #[tokio::test(start_paused = true)]
  async fn test_staleness_window() {
    let now = Instant::now();
    let mut e = entry(now);
    assert!(e.is_stale(now, Duration::from_secs(60)));

    e.fetched_at = Some(now);
    assert!(!e.is_stale(now + Duration::from_secs(59), Duration::from_secs(60)));
    assert!(e.is_stale(now + Duration::from_secs(60), Duration::from_secs(60)));

    e.invalidated = true;
    assert!(e.is_stale(now, Duration::from_secs(60)));
  }

  #[tokio::test(start_paused = true)]
  async fn test_expiry_counts_from_later_of_fetch_and_release() {
    let now = Instant::now();
    let gc = Duration::from_secs(600);
    let mut e = entry(now);
    e.fetched_at = Some(now);
    assert_eq!(e.expires_at(gc), now + gc);

    e.released_at = Some(now + Duration::from_secs(100));
    assert_eq!(e.expires_at(gc), now + Duration::from_secs(700));

    assert!(!e.is_evictable(now + Duration::from_secs(699), gc));
    assert!(e.is_evictable(now + Duration::from_secs(700), gc));

    e.subscribers = 1;
    assert!(!e.is_evictable(now + Duration::from_secs(9999), gc));
  }

  #[tokio::test]
  async fn test_publish_reaches_receivers() {
    let mut e = entry(Instant::now());
    let rx = e.notify.subscribe();
    e.status = QueryStatus::Success;
    e.data = Some(Arc::new(5u32));
    e.publish();

    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.status, QueryStatus::Success);
    let value = snapshot.data.and_then(|d| d.downcast::<u32>().ok());
    assert_eq!(value.as_deref(), Some(&5));
  }

  #[tokio::test(start_paused = true)]
  async fn test_reset_clears_data_but_keeps_subscribers() {
    let now = Instant::now();
    let mut e = entry(now);
    e.subscribers = 2;
    e.data = Some(Arc::new(1u32));
    e.status = QueryStatus::Success;
    e.fetched_at = Some(now);
    e.invalidated = true;
    let seq = e.fetch_seq;

    e.reset();
    assert!(e.data.is_none());
    assert_eq!(e.status, QueryStatus::Idle);
    assert!(!e.invalidated);
    assert_eq!(e.subscribers, 2);
    assert_eq!(e.fetch_seq, seq + 1);
    assert!(e.is_stale(now, Duration::from_secs(60)));
  }
}
