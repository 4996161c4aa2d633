//! Flashcard reads and writes through the query cache.

use color_eyre::{eyre::WrapErr, Result};
use super::cache_rules;
use super::client::ApiClient;
use super::types::{Flashcard, FlashcardUpdate, ListFilters, NewFlashcard, Paginated};
use crate::cache::{retry_with_backoff, Cacheable, QueryClient};
use crate::query::Query;

#[derive(Clone)]
pub struct FlashcardService {
  api: ApiClient,
  cache: QueryClient,
}

impl FlashcardService {
  pub fn new(api: ApiClient, cache: QueryClient) -> Self {
    Self { api, cache }
  }

  pub fn list_query(&self, filters: ListFilters) -> Query<Paginated<Flashcard>> {
    let api = self.api.clone();
    let key = Flashcard::list_key(&filters);
    Query::new(self.cache.clone(), key, move || {
      let api = api.clone();
      let filters = filters.clone();
      async move { api.list_flashcards(&filters).await }
    })
  }

  pub fn detail_query(&self, id: &str) -> Query<Flashcard> {
    let api = self.api.clone();
    let id = id.to_string();
    Query::new(self.cache.clone(), Flashcard::detail_key(&id), move || {
      let api = api.clone();
      let id = id.clone();
      async move { api.get_flashcard(&id).await }
    })
  }

  /// Put a card already fetched as part of a list into its detail entry.
  pub fn prime(&self, card: &Flashcard) {
    let key = Flashcard::detail_key(&card.id);
    if self.cache.get_query_data::<Flashcard>(&key).is_none() {
      self.cache.set_query_data(&key, card.clone());
    }
  }

  pub async fn create(&self, card: NewFlashcard) -> Result<Flashcard> {
    let policy = self.cache.options().mutation_retry;
    let created = retry_with_backoff(policy, "create flashcard", || {
      self.api.create_flashcard(&card)
    })
    .await
    .wrap_err("Flashcard was not created")?;
    cache_rules::on_created(&self.cache, &created);
    Ok(created)
  }

  pub async fn update(&self, id: &str, update: FlashcardUpdate) -> Result<Flashcard> {
    let policy = self.cache.options().mutation_retry;
    let updated = retry_with_backoff(policy, "update flashcard", || {
      self.api.update_flashcard(id, &update)
    })
    .await
    .wrap_err_with(|| format!("Flashcard {} was not updated", id))?;
    cache_rules::on_updated(&self.cache, &updated);
    Ok(updated)
  }

  pub async fn delete(&self, id: &str) -> Result<()> {
    let policy = self.cache.options().mutation_retry;
    retry_with_backoff(policy, "delete flashcard", || self.api.delete_flashcard(id))
      .await
      .wrap_err_with(|| format!("Flashcard {} was not deleted", id))?;
    cache_rules::on_deleted::<Flashcard>(&self.cache, id);
    Ok(())
  }
}
