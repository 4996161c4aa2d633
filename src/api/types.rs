//! Serde types matching the DevDecks REST API.
//!
//! Field names follow the backend's camelCase JSON; ids arrive as `_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Cacheable;

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
  #[serde(rename = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  /// Deck category, e.g. "DSA" or "GRE"
  #[serde(rename = "type", default)]
  pub deck_type: Option<String>,
  #[serde(default)]
  pub flashcard_count: Option<u32>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Cacheable for Deck {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "decks"
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
  #[serde(rename = "_id")]
  pub id: String,
  pub question: String,
  #[serde(default)]
  pub answer: String,
  /// Id of the owning deck
  #[serde(default)]
  pub deck: Option<String>,
  #[serde(default)]
  pub difficulty: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Cacheable for Flashcard {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "flashcards"
  }
}

// ============================================================================
// List queries
// ============================================================================

/// Filter object for paginated list endpoints.
///
/// Serialized both as the request query string and as the last segment of the
/// list cache key, so unset fields are skipped in both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub deck_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub search: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sort: Option<String>,
  /// Restrict flashcards to one deck
  #[serde(skip_serializing_if = "Option::is_none")]
  pub deck: Option<String>,
}

impl ListFilters {
  pub fn page(page: u32, limit: u32) -> Self {
    Self {
      page: Some(page),
      limit: Some(limit),
      ..Self::default()
    }
  }

  pub fn with_search(mut self, search: &str) -> Self {
    let search = search.trim();
    self.search = (!search.is_empty()).then(|| search.to_string());
    self
  }

  pub fn with_deck(mut self, deck_id: &str) -> Self {
    self.deck = Some(deck_id.to_string());
    self
  }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
  #[serde(alias = "decks", alias = "flashcards", alias = "items")]
  pub data: Vec<T>,
  #[serde(default)]
  pub total: u64,
  #[serde(default = "first_page")]
  pub page: u32,
  #[serde(default = "first_page")]
  pub total_pages: u32,
}

fn first_page() -> u32 {
  1
}

impl<T> Paginated<T> {
  pub fn has_next(&self) -> bool {
    self.page < self.total_pages
  }

  pub fn has_prev(&self) -> bool {
    self.page > 1
  }
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeck {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub deck_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub deck_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFlashcard {
  pub question: String,
  pub answer: String,
  pub deck: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub difficulty: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub question: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub answer: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub difficulty: Option<String>,
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemCompletion {
  pub problem_id: u32,
  pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemsCompleted {
  #[serde(default)]
  pub problems_completed: Vec<u32>,
}

impl ProblemsCompleted {
  pub fn contains(&self, problem_id: u32) -> bool {
    self.problems_completed.contains(&problem_id)
  }
}
