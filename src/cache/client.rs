//! Query client: keyed, time-bounded cache in front of the network.

use chrono::Utc;
use color_eyre::Result;
use futures::future::{self, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::entry::{AnyData, CacheEntry, FetchOutcome, Fetcher, InFlight, QuerySnapshot, QueryStatus};
use super::error::QueryError;
use super::key::QueryKey;
use super::retry::RetryPolicy;

/// Timing and retry behavior of a [`QueryClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
  /// How long fetched data is served without a network call
  pub stale_time: Duration,
  /// How long an unobserved entry is kept
  pub gc_time: Duration,
  pub retry: RetryPolicy,
  pub mutation_retry: RetryPolicy,
  pub refetch_on_reconnect: bool,
  pub refetch_on_window_focus: bool,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(5 * 60),
      gc_time: Duration::from_secs(10 * 60),
      retry: RetryPolicy::queries(),
      mutation_retry: RetryPolicy::mutations(),
      refetch_on_reconnect: true,
      refetch_on_window_focus: false,
    }
  }
}

struct Inner {
  entries: HashMap<String, CacheEntry>,
  online: bool,
  next_generation: u64,
}

/// Keyed query cache with stale-while-revalidate, retry, and prefix invalidation.
///
/// Constructed explicitly and handed to consumers; clones share the same cache.
/// At most one fetch per key is in flight: concurrent callers await the same
/// shared future, and every subscriber sees the result in one published snapshot.
#[derive(Clone)]
pub struct QueryClient {
  inner: Arc<Mutex<Inner>>,
  options: QueryOptions,
}

impl QueryClient {
  pub fn new(options: QueryOptions) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner {
        entries: HashMap::new(),
        online: true,
        next_generation: 0,
      })),
      options,
    }
  }

  pub fn options(&self) -> &QueryOptions {
    &self.options
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    // Critical sections never leave the map half-updated, so a poisoned lock is still usable.
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Get data for `key`, fetching through `fetcher` when needed.
  ///
  /// - fresh data: returned with no network call
  /// - stale, invalidated, or errored data: returned immediately while one
  ///   background refetch runs
  /// - no data: waits for the (shared) fetch
  pub async fn fetch_query<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    self.fetch_with(key, erase_fetcher(fetcher)).await
  }

  pub(crate) async fn fetch_with<T>(&self, key: &QueryKey, fetcher: Fetcher) -> Result<Arc<T>>
  where
    T: Send + Sync + 'static,
  {
    let pending = {
      let mut inner = self.lock();
      let now = Instant::now();
      let entry = self.entry_for(&mut inner, key, now);
      entry.fetcher = Some(fetcher);

      match entry.data.clone() {
        Some(data)
          if entry.status != QueryStatus::Error && !entry.is_stale(now, self.options.stale_time) =>
        {
          debug!(key = %key, "cache hit");
          return Ok(downcast(key, data)?);
        }
        Some(data) => {
          debug!(key = %key, "serving stale data, revalidating");
          let _ = self.start_fetch(entry);
          return Ok(downcast(key, data)?);
        }
        None => {
          debug!(key = %key, "cache miss");
          self.start_fetch(entry)
        }
      }
    };

    let data = pending.await?;
    Ok(downcast(key, data)?)
  }

  /// Register interest in `key`. The entry is fetched if it has no data or is stale,
  /// and kept alive until the returned handle is dropped.
  pub fn subscribe<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Subscription<T>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    self.subscribe_with(key, erase_fetcher(fetcher))
  }

  pub(crate) fn subscribe_with<T>(&self, key: &QueryKey, fetcher: Fetcher) -> Subscription<T>
  where
    T: Send + Sync + 'static,
  {
    let mut inner = self.lock();
    let now = Instant::now();
    let entry = self.entry_for(&mut inner, key, now);
    entry.fetcher = Some(fetcher);

    let needs_fetch = entry.data.is_none()
      || entry.status == QueryStatus::Error
      || entry.is_stale(now, self.options.stale_time);
    if needs_fetch {
      let _ = self.start_fetch(entry);
    }
    self.attach(entry)
  }

  /// Watch `key` without a fetch function. The entry is kept alive like a
  /// subscription but only changes through direct writes.
  pub fn observe<T>(&self, key: &QueryKey) -> Subscription<T>
  where
    T: Send + Sync + 'static,
  {
    let mut inner = self.lock();
    let entry = self.entry_for(&mut inner, key, Instant::now());
    self.attach(entry)
  }

  fn attach<T>(&self, entry: &mut CacheEntry) -> Subscription<T>
  where
    T: Send + Sync + 'static,
  {
    entry.subscribers += 1;
    debug!(key = %entry.key, subscribers = entry.subscribers, "subscribed");
    Subscription {
      client: self.clone(),
      key: entry.key.clone(),
      hash: entry.hash.clone(),
      generation: entry.generation,
      receiver: entry.notify.subscribe(),
      _data: PhantomData,
    }
  }

  /// Mark every entry under `prefix` stale. Observed entries refetch right away,
  /// the rest on their next access; old data keeps being served meanwhile.
  pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
    let mut inner = self.lock();
    let mut count = 0;
    for entry in inner.entries.values_mut() {
      if !entry.key.starts_with(prefix) {
        continue;
      }
      count += 1;
      entry.invalidated = true;
      entry.epoch += 1;
      if entry.subscribers > 0 && entry.in_flight.is_none() && entry.fetcher.is_some() {
        let _ = self.start_fetch(entry);
      } else {
        entry.publish();
      }
    }
    info!(prefix = %prefix, count, "invalidated queries");
    count
  }

  /// Write `value` straight into `key` without a round trip.
  pub fn set_query_data<T>(&self, key: &QueryKey, value: T)
  where
    T: Send + Sync + 'static,
  {
    let mut inner = self.lock();
    let now = Instant::now();
    let entry = self.entry_for(&mut inner, key, now);
    entry.data = Some(Arc::new(value));
    entry.error = None;
    entry.status = if entry.in_flight.is_some() {
      QueryStatus::Fetching
    } else {
      QueryStatus::Success
    };
    entry.fetched_at = Some(now);
    entry.updated_at = Some(Utc::now());
    entry.retry_count = 0;
    entry.invalidated = false;
    entry.publish();
    debug!(key = %key, "cache written directly");

    let deadline = (entry.subscribers == 0).then(|| entry.expires_at(self.options.gc_time));
    drop(inner);
    if let Some(deadline) = deadline {
      self.schedule_gc(deadline);
    }
  }

  /// Cached data for `key`, without fetching.
  pub fn get_query_data<T>(&self, key: &QueryKey) -> Option<Arc<T>>
  where
    T: Send + Sync + 'static,
  {
    let mut inner = self.lock();
    self.evict_if_expired(&mut inner, &key.hash(), Instant::now());
    let data = inner.entries.get(&key.hash())?.data.clone()?;
    data.downcast::<T>().ok()
  }

  /// Drop every entry under `prefix`. Results of fetches still in flight for them are discarded.
  ///
  /// Observed entries are emptied instead, so their subscribers stay attached and see
  /// the next fetch or direct write.
  pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
    let mut inner = self.lock();
    let mut removed = 0;
    inner.entries.retain(|_, entry| {
      if !entry.key.starts_with(prefix) {
        return true;
      }
      removed += 1;
      if entry.subscribers == 0 {
        return false;
      }
      entry.reset();
      if entry.fetcher.is_some() {
        let _ = self.start_fetch(entry);
      } else {
        entry.publish();
      }
      true
    });
    debug!(prefix = %prefix, removed, "removed queries");
    removed
  }

  /// Evict every unobserved entry whose gc deadline has passed.
  pub fn collect_garbage(&self) -> usize {
    let mut inner = self.lock();
    let now = Instant::now();
    let gc_time = self.options.gc_time;
    let before = inner.entries.len();
    inner
      .entries
      .retain(|_, entry| !entry.is_evictable(now, gc_time));
    let evicted = before - inner.entries.len();
    if evicted > 0 {
      debug!(evicted, "collected expired queries");
    }
    evicted
  }

  /// Record connectivity. Coming back online refetches every stale entry.
  pub fn set_online(&self, online: bool) -> usize {
    let mut inner = self.lock();
    let was_online = std::mem::replace(&mut inner.online, online);
    match (was_online, online) {
      (false, true) => {
        info!("network reconnected");
        if self.options.refetch_on_reconnect {
          return self.refetch_stale(&mut inner, "reconnect");
        }
        0
      }
      (true, false) => {
        warn!("network offline");
        0
      }
      _ => 0,
    }
  }

  pub fn is_online(&self) -> bool {
    self.lock().online
  }

  /// Terminal regained focus. Refetches stale entries only when enabled.
  pub fn on_window_focus(&self) -> usize {
    if !self.options.refetch_on_window_focus {
      debug!("window focus refetch disabled");
      return 0;
    }
    let mut inner = self.lock();
    self.refetch_stale(&mut inner, "window focus")
  }

  fn entry_for<'a>(&self, inner: &'a mut Inner, key: &QueryKey, now: Instant) -> &'a mut CacheEntry {
    let hash = key.hash();
    self.evict_if_expired(inner, &hash, now);
    let Inner {
      entries,
      next_generation,
      ..
    } = inner;
    entries.entry(hash).or_insert_with(|| {
      *next_generation += 1;
      CacheEntry::new(key.clone(), *next_generation, now)
    })
  }

  fn evict_if_expired(&self, inner: &mut Inner, hash: &str, now: Instant) {
    let expired = inner
      .entries
      .get(hash)
      .is_some_and(|entry| entry.is_evictable(now, self.options.gc_time));
    if expired {
      if let Some(entry) = inner.entries.remove(hash) {
        debug!(key = %entry.key, "evicted expired entry");
      }
    }
  }

  fn refetch_stale(&self, inner: &mut Inner, reason: &str) -> usize {
    let now = Instant::now();
    let mut count = 0;
    for entry in inner.entries.values_mut() {
      let due = entry.status == QueryStatus::Error || entry.is_stale(now, self.options.stale_time);
      if due && entry.in_flight.is_none() && entry.fetcher.is_some() {
        let _ = self.start_fetch(entry);
        count += 1;
      }
    }
    info!(reason, count, "refetching stale queries");
    count
  }

  /// Start a fetch for `entry` unless one is already in flight.
  /// Must be called with the lock held; the fetch itself runs on a spawned task.
  fn start_fetch(&self, entry: &mut CacheEntry) -> InFlight {
    if let Some(in_flight) = &entry.in_flight {
      return in_flight.clone();
    }
    let Some(fetcher) = entry.fetcher.clone() else {
      let err = QueryError::new(format!("No fetch function registered for {}", entry.key));
      return future::ready(Err(err)).boxed().shared();
    };

    entry.fetch_seq += 1;
    let client = self.clone();
    let policy = self.options.retry;
    let key = entry.key.clone();
    let target = FetchTarget {
      hash: entry.hash.clone(),
      generation: entry.generation,
      seq: entry.fetch_seq,
    };
    let epoch = entry.epoch;

    let task = async move {
      let mut failures = 0u32;
      loop {
        match fetcher().await {
          Ok(data) => {
            client.finish(&target, epoch, Ok(data.clone()));
            return Ok(data);
          }
          Err(report) => {
            failures += 1;
            let err = QueryError::from_report(&report);
            if !policy.should_retry(failures) {
              error!(key = %key, attempts = failures, error = %err, "query failed");
              client.finish(&target, epoch, Err(err.clone()));
              return Err(err);
            }
            let delay = policy.delay_for(failures);
            warn!(
              key = %key,
              attempt = failures,
              delay_ms = delay.as_millis() as u64,
              error = %err,
              "query failed, retrying"
            );
            client.record_failure(&target, failures, err);
            tokio::time::sleep(delay).await;
          }
        }
      }
    }
    .boxed()
    .shared();

    entry.in_flight = Some(task.clone());
    entry.status = QueryStatus::Fetching;
    entry.retry_count = 0;
    entry.publish();

    // Drive the fetch independently of whoever asked for it, so the result is
    // cached even if every caller goes away.
    if let Ok(handle) = Handle::try_current() {
      handle.spawn(task.clone());
    }
    task
  }

  fn record_failure(&self, target: &FetchTarget, failures: u32, err: QueryError) {
    let mut inner = self.lock();
    if let Some(entry) = target.find(&mut inner) {
      entry.retry_count = failures;
      entry.error = Some(err);
      entry.publish();
    }
  }

  fn finish(&self, target: &FetchTarget, epoch: u64, outcome: FetchOutcome) {
    let mut inner = self.lock();
    let now = Instant::now();
    let Some(entry) = target.find(&mut inner) else {
      debug!("discarding result of superseded fetch");
      return;
    };

    entry.in_flight = None;
    let succeeded = outcome.is_ok();
    match outcome {
      Ok(data) => {
        entry.data = Some(data);
        entry.error = None;
        entry.status = QueryStatus::Success;
        entry.fetched_at = Some(now);
        entry.updated_at = Some(Utc::now());
        entry.retry_count = 0;
        // Invalidated while this fetch was running: the data may predate the change.
        entry.invalidated = entry.epoch != epoch;
      }
      Err(err) => {
        entry.error = Some(err);
        entry.status = QueryStatus::Error;
      }
    }
    entry.publish();

    if succeeded && entry.invalidated && entry.subscribers > 0 {
      debug!(key = %entry.key, "invalidated during fetch, refetching");
      let _ = self.start_fetch(entry);
    }

    let deadline = (entry.subscribers == 0).then(|| entry.expires_at(self.options.gc_time));
    drop(inner);
    if let Some(deadline) = deadline {
      self.schedule_gc(deadline);
    }
  }

  fn release(&self, hash: &str, generation: u64) {
    let mut inner = self.lock();
    let Some(entry) = inner
      .entries
      .get_mut(hash)
      .filter(|entry| entry.generation == generation)
    else {
      return;
    };
    entry.subscribers = entry.subscribers.saturating_sub(1);
    debug!(key = %entry.key, subscribers = entry.subscribers, "unsubscribed");
    if entry.subscribers > 0 {
      return;
    }
    entry.released_at = Some(Instant::now());
    let deadline = entry.expires_at(self.options.gc_time);
    drop(inner);
    self.schedule_gc(deadline);
  }

  fn schedule_gc(&self, deadline: Instant) {
    let Ok(handle) = Handle::try_current() else {
      return;
    };
    let inner: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
    let options = self.options;
    handle.spawn(async move {
      tokio::time::sleep_until(deadline).await;
      if let Some(inner) = inner.upgrade() {
        QueryClient { inner, options }.collect_garbage();
      }
    });
  }
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new(QueryOptions::default())
  }
}

/// Identifies the one fetch allowed to write back into an entry.
struct FetchTarget {
  hash: String,
  generation: u64,
  seq: u64,
}

impl FetchTarget {
  fn find<'a>(&self, inner: &'a mut Inner) -> Option<&'a mut CacheEntry> {
    inner
      .entries
      .get_mut(&self.hash)
      .filter(|entry| entry.generation == self.generation && entry.fetch_seq == self.seq)
  }
}

#[cfg(test)]
impl QueryClient {
  /// Wait for the in-flight fetch of `key`, if there is one.
  pub async fn wait_for_fetch(&self, key: &QueryKey) -> Option<Result<(), QueryError>> {
    let pending = {
      let inner = self.lock();
      inner.entries.get(&key.hash())?.in_flight.clone()?
    };
    Some(pending.await.map(|_| ()))
  }

  /// Whether `key` currently has an entry (expired, unobserved entries count as gone).
  pub fn is_cached(&self, key: &QueryKey) -> bool {
    let mut inner = self.lock();
    let hash = key.hash();
    self.evict_if_expired(&mut inner, &hash, Instant::now());
    inner.entries.contains_key(&hash)
  }

  /// Whether `key` would be refetched on its next access.
  pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
    let inner = self.lock();
    let entry = inner.entries.get(&key.hash())?;
    Some(entry.is_stale(Instant::now(), self.options.stale_time))
  }

  pub fn snapshot(&self, key: &QueryKey) -> Option<QuerySnapshot> {
    let inner = self.lock();
    inner.entries.get(&key.hash()).map(CacheEntry::snapshot)
  }

  pub fn is_empty(&self) -> bool {
    self.lock().entries.is_empty()
  }
}

/// Typed view of an entry at one point in time.
#[derive(Debug)]
pub struct QueryView<T> {
  pub status: QueryStatus,
  pub data: Option<Arc<T>>,
  pub error: Option<QueryError>,
  pub updated_at: Option<chrono::DateTime<Utc>>,
  /// Failed attempts of the fetch in progress
  pub retry_count: u32,
}

impl<T> Clone for QueryView<T> {
  fn clone(&self) -> Self {
    Self {
      status: self.status,
      data: self.data.clone(),
      error: self.error.clone(),
      updated_at: self.updated_at,
      retry_count: self.retry_count,
    }
  }
}

impl<T> Default for QueryView<T> {
  fn default() -> Self {
    Self {
      status: QueryStatus::Idle,
      data: None,
      error: None,
      updated_at: None,
      retry_count: 0,
    }
  }
}

impl<T: Send + Sync + 'static> QueryView<T> {
  fn from_snapshot(key: &QueryKey, snapshot: QuerySnapshot) -> Self {
    let (data, error) = match snapshot.data.map(|d| d.downcast::<T>()) {
      Some(Ok(data)) => (Some(data), snapshot.error),
      Some(Err(_)) => (
        None,
        Some(QueryError::type_mismatch(
          &key.canonical(),
          std::any::type_name::<T>(),
        )),
      ),
      None => (None, snapshot.error),
    };
    Self {
      status: snapshot.status,
      data,
      error,
      updated_at: snapshot.updated_at,
      retry_count: snapshot.retry_count,
    }
  }
}

/// Live interest in one key. Dropping it releases the entry for garbage collection.
pub struct Subscription<T> {
  client: QueryClient,
  key: QueryKey,
  hash: String,
  generation: u64,
  receiver: watch::Receiver<QuerySnapshot>,
  _data: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
  /// Whether a new snapshot was published since the last `current()`.
  pub fn has_changed(&self) -> bool {
    self.receiver.has_changed().unwrap_or(false)
  }

  /// Latest snapshot, marking it seen.
  pub fn current(&mut self) -> QueryView<T> {
    let snapshot = self.receiver.borrow_and_update().clone();
    QueryView::from_snapshot(&self.key, snapshot)
  }
}

impl<T> Drop for Subscription<T> {
  fn drop(&mut self) {
    self.client.release(&self.hash, self.generation);
  }
}

pub(crate) fn erase_fetcher<T, F, Fut>(fetcher: F) -> Fetcher
where
  T: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T>> + Send + 'static,
{
  Arc::new(move || {
    let fut = fetcher();
    async move { fut.await.map(|value| Arc::new(value) as AnyData) }.boxed()
  })
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, data: AnyData) -> Result<Arc<T>, QueryError> {
  data
    .downcast::<T>()
    .map_err(|_| QueryError::type_mismatch(&key.canonical(), std::any::type_name::<T>()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn options() -> QueryOptions {
    QueryOptions {
      stale_time: Duration::from_secs(60),
      gc_time: Duration::from_secs(300),
      ..QueryOptions::default()
    }
  }

  fn list_key(entity: &str, page: u32) -> QueryKey {
    QueryKey::from_segments(&[entity, "list"]).param(&json!({ "page": page }))
  }

  /// Fetcher that returns how many times it has been called.
  fn counting(calls: &Arc<AtomicU32>) -> impl Fn() -> futures::future::BoxFuture<'static, Result<u32>> + Send + Sync + 'static {
    let calls = calls.clone();
    move || {
      let calls = calls.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
      }
      .boxed()
    }
  }

  async fn settle() {
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_gets_share_one_fetch() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    let (a, b) = tokio::join!(
      client.fetch_query(&key, counting(&calls)),
      client.fetch_query(&key, counting(&calls)),
    );

    assert_eq!(*a.unwrap(), 1);
    assert_eq!(*b.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_data_skips_network() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    client.fetch_query(&key, counting(&calls)).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    let again = client.fetch_query(&key, counting(&calls)).await.unwrap();

    assert_eq!(*again, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_data_served_while_revalidating() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    client.fetch_query(&key, counting(&calls)).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;

    let stale = client.fetch_query(&key, counting(&calls)).await.unwrap();
    assert_eq!(*stale, 1, "stale value is returned immediately");

    // A second read while the refetch is in flight does not start another one.
    let still_stale = client.fetch_query(&key, counting(&calls)).await.unwrap();
    assert_eq!(*still_stale, 1);

    client.wait_for_fetch(&key).await.unwrap().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let fresh = client.fetch_query(&key, counting(&calls)).await.unwrap();
    assert_eq!(*fresh, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_unobserved_entry_evicted_at_gc_time() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    client.fetch_query(&key, counting(&calls)).await.unwrap();
    assert!(client.is_cached(&key));

    tokio::time::sleep(Duration::from_secs(300) - Duration::from_millis(1)).await;
    assert!(client.is_cached(&key));

    tokio::time::sleep(Duration::from_millis(1)).await;
    settle().await;
    assert!(!client.is_cached(&key));
    assert!(client.is_empty());

    client.fetch_query(&key, counting(&calls)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_subscribed_entry_survives_gc() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    let subscription: Subscription<u32> = client.subscribe(&key, counting(&calls));
    client.wait_for_fetch(&key).await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_secs(1000)).await;
    settle().await;
    assert!(client.is_cached(&key));

    drop(subscription);
    tokio::time::sleep(Duration::from_secs(299)).await;
    assert!(client.is_cached(&key));
    tokio::time::sleep(Duration::from_secs(1)).await;
    settle().await;
    assert!(!client.is_cached(&key));
  }

  #[tokio::test(start_paused = true)]
  async fn test_prefix_invalidation() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let decks_one = list_key("decks", 1);
    let decks_two = list_key("decks", 2);
    let cards_one = list_key("flashcards", 1);

    for key in [&decks_one, &decks_two, &cards_one] {
      client.fetch_query(key, counting(&calls)).await.unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let invalidated = client.invalidate_queries(&QueryKey::from_segments(&["decks", "list"]));
    assert_eq!(invalidated, 2);
    assert_eq!(client.is_stale(&decks_one), Some(true));
    assert_eq!(client.is_stale(&decks_two), Some(true));
    assert_eq!(client.is_stale(&cards_one), Some(false));

    // Old data is served while exactly one refetch per invalidated key runs.
    let served = client.fetch_query(&decks_one, counting(&calls)).await.unwrap();
    assert_eq!(*served, 1);
    client.fetch_query(&cards_one, counting(&calls)).await.unwrap();
    client.wait_for_fetch(&decks_one).await.unwrap().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(client.is_stale(&decks_one), Some(false));
  }

  #[tokio::test(start_paused = true)]
  async fn test_retries_with_backoff_then_surfaces_error() {
    let client = QueryClient::new(options());
    let attempts: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let key = list_key("decks", 1);

    let recorded = attempts.clone();
    let result = client
      .fetch_query(&key, move || {
        let recorded = recorded.clone();
        async move {
          recorded.lock().unwrap().push(Instant::now());
          Err::<u32, _>(eyre!("connection refused"))
        }
      })
      .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("connection refused"));

    let attempts = attempts.lock().unwrap().clone();
    assert_eq!(attempts.len(), 3, "initial attempt plus two retries");
    let first_gap = attempts[1] - attempts[0];
    let second_gap = attempts[2] - attempts[1];
    assert!(first_gap >= Duration::from_millis(1000) && first_gap < Duration::from_millis(1100));
    assert!(second_gap >= Duration::from_millis(2000) && second_gap < Duration::from_millis(2100));

    let snapshot = client.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Error);
    assert_eq!(snapshot.retry_count, 2);
    assert!(snapshot.error.is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_error_is_retained_until_next_success() {
    let client = QueryClient::new(QueryOptions {
      retry: RetryPolicy::new(0),
      ..options()
    });
    let key = list_key("decks", 1);
    let fail = Arc::new(std::sync::atomic::AtomicBool::new(true));

    let flag = fail.clone();
    let fetcher = move || {
      let flag = flag.clone();
      async move {
        if flag.load(Ordering::SeqCst) {
          Err(eyre!("500 Internal Server Error"))
        } else {
          Ok(42u32)
        }
      }
    };

    assert!(client.fetch_query(&key, fetcher.clone()).await.is_err());
    assert!(client.snapshot(&key).unwrap().error.is_some());

    fail.store(false, Ordering::SeqCst);
    let value = client.fetch_query(&key, fetcher).await.unwrap();
    assert_eq!(*value, 42);
    let snapshot = client.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert!(snapshot.error.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_direct_write_seeds_detail_cache() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::from_segments(&["decks", "detail", "d42"]);

    client.set_query_data(&key, 99u32);
    let value = client.fetch_query(&key, counting(&calls)).await.unwrap();

    assert_eq!(*value, 99);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(client.get_query_data::<u32>(&key).as_deref(), Some(&99));
  }

  #[tokio::test(start_paused = true)]
  async fn test_subscribers_see_the_same_snapshot() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    let mut first: Subscription<u32> = client.subscribe(&key, counting(&calls));
    let mut second: Subscription<u32> = client.subscribe(&key, counting(&calls));

    client.wait_for_fetch(&key).await.unwrap().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(first.has_changed());
    assert!(second.has_changed());
    let a = first.current();
    let b = second.current();
    assert_eq!(a.status, QueryStatus::Success);
    assert!(Arc::ptr_eq(a.data.as_ref().unwrap(), b.data.as_ref().unwrap()));
    assert!(!first.has_changed());
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidating_observed_query_refetches_immediately() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    let mut subscription: Subscription<u32> = client.subscribe(&key, counting(&calls));
    client.wait_for_fetch(&key).await.unwrap().unwrap();
    subscription.current();

    client.invalidate_queries(&QueryKey::from_segments(&["decks"]));
    let during = subscription.current();
    assert_eq!(during.status, QueryStatus::Fetching);
    assert_eq!(during.data.as_deref(), Some(&1), "old data kept while refetching");

    client.wait_for_fetch(&key).await.unwrap().unwrap();
    assert_eq!(subscription.current().data.as_deref(), Some(&2));
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_during_fetch_leaves_entry_stale() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    let pending = {
      let client = client.clone();
      let key = key.clone();
      let fetcher = counting(&calls);
      tokio::spawn(async move { client.fetch_query(&key, fetcher).await })
    };
    settle().await;
    client.invalidate_queries(&QueryKey::from_segments(&["decks", "list"]));

    assert_eq!(*pending.await.unwrap().unwrap(), 1);
    assert_eq!(client.is_stale(&key), Some(true));
  }

  #[tokio::test(start_paused = true)]
  async fn test_result_cached_after_subscriber_leaves() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    let subscription: Subscription<u32> = client.subscribe(&key, counting(&calls));
    drop(subscription);

    client.wait_for_fetch(&key).await.unwrap().unwrap();
    assert_eq!(client.get_query_data::<u32>(&key).as_deref(), Some(&1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_removed_entry_discards_late_result() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::from_segments(&["decks", "detail", "gone"]);

    let subscription: Subscription<u32> = client.subscribe(&key, counting(&calls));
    drop(subscription);
    assert_eq!(client.remove_queries(&key), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!client.is_cached(&key));
  }

  #[tokio::test(start_paused = true)]
  async fn test_removing_observed_entry_keeps_subscriber_attached() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = QueryKey::from_segments(&["decks", "detail", "d7"]);

    let mut subscription: Subscription<u32> = client.subscribe(&key, counting(&calls));
    client.wait_for_fetch(&key).await.unwrap().unwrap();
    assert_eq!(subscription.current().data.as_deref(), Some(&1));

    assert_eq!(client.remove_queries(&key), 1);
    let cleared = subscription.current();
    assert!(cleared.data.is_none());
    assert_eq!(cleared.status, QueryStatus::Fetching);

    client.set_query_data(&key, 77u32);
    assert!(subscription.has_changed());
    assert_eq!(subscription.current().data.as_deref(), Some(&77));
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_started_before_removal_does_not_land() {
    let client = QueryClient::new(options());
    let key = QueryKey::from_segments(&["decks", "detail", "d8"]);
    let first = Arc::new(std::sync::atomic::AtomicBool::new(true));

    let flag = first.clone();
    let mut subscription: Subscription<&'static str> = client.subscribe(&key, move || {
      let old = flag.swap(false, Ordering::SeqCst);
      async move {
        // The fetch issued before removal answers last
        let delay = if old { 50 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(if old { "before" } else { "after" })
      }
    });
    settle().await;
    client.remove_queries(&key);

    tokio::time::sleep(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(subscription.current().data.as_deref(), Some(&"after"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_observed_entry_survives_gc_without_fetching() {
    let client = QueryClient::new(options());
    let key = QueryKey::from_segments(&["users", "problems-completed"]);

    let mut observer: Subscription<u32> = client.observe(&key);
    assert_eq!(observer.current().status, QueryStatus::Idle);
    client.set_query_data(&key, 3u32);
    assert!(observer.has_changed());

    tokio::time::sleep(Duration::from_secs(1000)).await;
    settle().await;
    assert_eq!(client.get_query_data::<u32>(&key).as_deref(), Some(&3));
    assert_eq!(client.invalidate_queries(&key), 1);
    assert!(client.wait_for_fetch(&key).await.is_none());

    drop(observer);
    tokio::time::sleep(Duration::from_secs(300)).await;
    settle().await;
    assert!(!client.is_cached(&key));
  }

  #[tokio::test(start_paused = true)]
  async fn test_reconnect_refetches_stale_entries_but_focus_does_not() {
    let client = QueryClient::new(options());
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    client.fetch_query(&key, counting(&calls)).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;

    assert_eq!(client.on_window_focus(), 0);
    assert_eq!(client.set_online(false), 0);
    assert!(!client.is_online());
    assert_eq!(client.set_online(true), 1);

    client.wait_for_fetch(&key).await.unwrap().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_focus_refetch_when_enabled() {
    let client = QueryClient::new(QueryOptions {
      refetch_on_window_focus: true,
      ..options()
    });
    let calls = Arc::new(AtomicU32::new(0));
    let key = list_key("decks", 1);

    client.fetch_query(&key, counting(&calls)).await.unwrap();
    assert_eq!(client.on_window_focus(), 0, "fresh entries are left alone");
    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(client.on_window_focus(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_type_mismatch_is_an_error() {
    let client = QueryClient::new(options());
    let key = QueryKey::from_segments(&["decks", "detail", "d1"]);
    client.set_query_data(&key, String::from("not a number"));

    let result = client
      .fetch_query(&key, || async { Ok::<u32, color_eyre::Report>(1) })
      .await;
    assert!(result.unwrap_err().to_string().contains("is not a"));
    assert!(client.get_query_data::<u32>(&key).is_none());
  }
}
