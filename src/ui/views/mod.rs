mod deck_detail;
mod deck_list;
mod flashcard_detail;
mod landing;
mod problem_list;

pub use deck_detail::DeckDetailView;
pub use deck_list::DeckListView;
pub use flashcard_detail::FlashcardDetailView;
pub use landing::LandingView;
pub use problem_list::ProblemListView;
