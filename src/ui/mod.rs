pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use ratatui::widgets::ListState;

/// Keep a list selection inside `0..len`, selecting the first row when there is none.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(i) if i >= len => state.select(Some(len - 1)),
    Some(_) => {}
    None => state.select(Some(0)),
  }
}
