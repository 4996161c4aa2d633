//! What a successful write does to the cache.

use tracing::debug;

use crate::cache::{Cacheable, QueryClient};

/// Seed the detail entry of a new entity and mark every list of its type stale.
pub fn on_created<T: Cacheable>(cache: &QueryClient, entity: &T) {
  let id = entity.cache_key();
  cache.set_query_data(&T::detail_key(&id), entity.clone());
  cache.invalidate_queries(&T::lists_key());
  debug!(entity = T::entity_type(), id = %id, "cache updated after create");
}

/// Overwrite the detail entry and mark every list of its type stale.
pub fn on_updated<T: Cacheable>(cache: &QueryClient, entity: &T) {
  let id = entity.cache_key();
  cache.set_query_data(&T::detail_key(&id), entity.clone());
  cache.invalidate_queries(&T::lists_key());
  debug!(entity = T::entity_type(), id = %id, "cache updated after update");
}

/// Drop the detail entry and mark every list of its type stale.
pub fn on_deleted<T: Cacheable>(cache: &QueryClient, id: &str) {
  cache.remove_queries(&T::detail_key(id));
  cache.invalidate_queries(&T::lists_key());
  debug!(entity = T::entity_type(), id, "cache updated after delete");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{Deck, Flashcard, ListFilters, Paginated};
  use crate::cache::QueryOptions;

  fn deck(id: &str, name: &str) -> Deck {
    Deck {
      id: id.to_string(),
      name: name.to_string(),
      description: None,
      deck_type: Some("DSA".to_string()),
      flashcard_count: None,
      created_at: None,
      updated_at: None,
    }
  }

  fn seeded_cache() -> QueryClient {
    let cache = QueryClient::new(QueryOptions::default());
    let page = Paginated {
      data: vec![deck("d1", "Graphs")],
      total: 1,
      page: 1,
      total_pages: 1,
    };
    cache.set_query_data(&Deck::list_key(&ListFilters::page(1, 20)), page.clone());
    cache.set_query_data(
      &Deck::list_key(&ListFilters::page(1, 20).with_search("gra")),
      page,
    );
    cache.set_query_data(
      &Flashcard::list_key(&ListFilters::page(1, 20)),
      Paginated::<Flashcard> {
        data: Vec::new(),
        total: 0,
        page: 1,
        total_pages: 1,
      },
    );
    cache
  }

  #[tokio::test]
  async fn test_create_seeds_detail_and_invalidates_lists() {
    let cache = seeded_cache();
    let created = deck("d2", "Heaps");

    on_created(&cache, &created);

    let detail = cache.get_query_data::<Deck>(&Deck::detail_key("d2"));
    assert_eq!(detail.as_deref(), Some(&created));
    assert_eq!(cache.is_stale(&Deck::detail_key("d2")), Some(false));
    assert_eq!(
      cache.is_stale(&Deck::list_key(&ListFilters::page(1, 20))),
      Some(true)
    );
    assert_eq!(
      cache.is_stale(&Deck::list_key(&ListFilters::page(1, 20).with_search("gra"))),
      Some(true)
    );
    assert_eq!(
      cache.is_stale(&Flashcard::list_key(&ListFilters::page(1, 20))),
      Some(false)
    );
  }

  #[tokio::test]
  async fn test_update_overwrites_detail() {
    let cache = seeded_cache();
    on_created(&cache, &deck("d1", "Graphs"));

    on_updated(&cache, &deck("d1", "Graph Theory"));

    let detail = cache.get_query_data::<Deck>(&Deck::detail_key("d1"));
    assert_eq!(detail.map(|d| d.name.clone()).as_deref(), Some("Graph Theory"));
  }

  #[tokio::test]
  async fn test_delete_removes_detail_and_keeps_list_data() {
    let cache = seeded_cache();
    on_created(&cache, &deck("d1", "Graphs"));

    on_deleted::<Deck>(&cache, "d1");

    assert!(!cache.is_cached(&Deck::detail_key("d1")));
    let key = Deck::list_key(&ListFilters::page(1, 20));
    assert_eq!(cache.is_stale(&key), Some(true));
    // Stale list data is still served until the refetch lands
    assert!(cache.get_query_data::<Paginated<Deck>>(&key).is_some());
  }
}
