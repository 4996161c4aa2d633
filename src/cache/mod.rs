//! Client-side query cache.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Stores one entry per hierarchical key, shared by every consumer of that key
//! - Serves fresh data without a network call and stale data while revalidating
//! - Retries failed fetches with capped exponential backoff
//! - Invalidates by key prefix and accepts direct writes after mutations
//! - Evicts unobserved entries once their gc time has passed

mod client;
mod entry;
mod error;
mod key;
mod retry;
mod traits;

pub use client::{QueryClient, QueryOptions, QueryView, Subscription};
pub use entry::QueryStatus;
pub use error::QueryError;
pub use key::QueryKey;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use traits::Cacheable;

pub(crate) use client::erase_fetcher;
pub(crate) use entry::Fetcher;
