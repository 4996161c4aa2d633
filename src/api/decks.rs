//! Deck reads and writes through the query cache.

use color_eyre::{eyre::WrapErr, Result};
use super::cache_rules;
use super::client::ApiClient;
use super::types::{Deck, DeckUpdate, Flashcard, ListFilters, NewDeck, Paginated};
use crate::cache::{retry_with_backoff, Cacheable, QueryClient};
use crate::query::Query;
use tracing::debug;

#[derive(Clone)]
pub struct DeckService {
  api: ApiClient,
  cache: QueryClient,
}

impl DeckService {
  pub fn new(api: ApiClient, cache: QueryClient) -> Self {
    Self { api, cache }
  }

  /// Observer for one page of decks.
  pub fn list_query(&self, filters: ListFilters) -> Query<Paginated<Deck>> {
    let api = self.api.clone();
    let key = Deck::list_key(&filters);
    Query::new(self.cache.clone(), key, move || {
      let api = api.clone();
      let filters = filters.clone();
      async move { api.list_decks(&filters).await }
    })
  }

  pub fn detail_query(&self, id: &str) -> Query<Deck> {
    let api = self.api.clone();
    let id = id.to_string();
    Query::new(self.cache.clone(), Deck::detail_key(&id), move || {
      let api = api.clone();
      let id = id.clone();
      async move { api.get_deck(&id).await }
    })
  }

  /// Warm the cache for one page of decks in the background. Fresh pages are left alone.
  pub fn prefetch_list(&self, filters: ListFilters) {
    let api = self.api.clone();
    let cache = self.cache.clone();
    tokio::spawn(async move {
      let key = Deck::list_key(&filters);
      let fetched = cache
        .fetch_query(&key, move || {
          let api = api.clone();
          let filters = filters.clone();
          async move { api.list_decks(&filters).await }
        })
        .await;
      if let Err(e) = fetched {
        debug!(key = %key, error = %e, "deck prefetch failed");
      }
    });
  }

  pub async fn create(&self, deck: NewDeck) -> Result<Deck> {
    let policy = self.cache.options().mutation_retry;
    let created = retry_with_backoff(policy, "create deck", || self.api.create_deck(&deck))
      .await
      .wrap_err("Deck was not created")?;
    cache_rules::on_created(&self.cache, &created);
    Ok(created)
  }

  pub async fn update(&self, id: &str, update: DeckUpdate) -> Result<Deck> {
    let policy = self.cache.options().mutation_retry;
    let updated = retry_with_backoff(policy, "update deck", || {
      self.api.update_deck(id, &update)
    })
    .await
    .wrap_err_with(|| format!("Deck {} was not updated", id))?;
    cache_rules::on_updated(&self.cache, &updated);
    Ok(updated)
  }

  /// Delete a deck. Its flashcards change membership, so their lists go stale too.
  pub async fn delete(&self, id: &str) -> Result<()> {
    let policy = self.cache.options().mutation_retry;
    retry_with_backoff(policy, "delete deck", || self.api.delete_deck(id))
      .await
      .wrap_err_with(|| format!("Deck {} was not deleted", id))?;
    cache_rules::on_deleted::<Deck>(&self.cache, id);
    self.cache.invalidate_queries(&Flashcard::lists_key());
    Ok(())
  }
}
