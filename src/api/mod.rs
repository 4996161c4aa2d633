//! DevDecks backend: HTTP client, wire types, and cached services.

mod cache_rules;
pub mod client;
pub mod decks;
pub mod flashcards;
pub mod types;
pub mod users;

pub use client::ApiClient;
pub use decks::DeckService;
pub use flashcards::FlashcardService;
pub use users::UserService;
