use super::{overlay_rect, InputResult, KeyResult, TextInput};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// What the owning view should do after a search key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// New text to filter by; empty after Esc
  Changed(String),
  /// Overlay closed, search text persists
  Submitted,
}

/// Search box opened with `/`.
///
/// Re-opening continues editing the current text; Esc clears it.
#[derive(Debug, Clone)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
  title: &'static str,
}

impl Default for SearchInput {
  fn default() -> Self {
    Self::new(" Search ")
  }
}

impl SearchInput {
  pub fn new(title: &'static str) -> Self {
    Self {
      input: TextInput::new(),
      active: false,
      title,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> &str {
    self.input.value()
  }

  /// Drop the search text without emitting an event
  pub fn clear(&mut self) {
    self.input.clear();
  }

  /// Feed a key; `/` opens the box when it is closed.
  ///
  /// `Changed` fires only when the text differs, so cursor movement does not refilter.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code != KeyCode::Char('/') {
        return KeyResult::NotHandled;
      }
      self.active = true;
      return KeyResult::Handled;
    }

    let before = self.input.value().to_string();
    match self.input.handle_key(key) {
      InputResult::Submitted(_) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        if before.is_empty() {
          KeyResult::Event(SearchEvent::Submitted)
        } else {
          KeyResult::Event(SearchEvent::Changed(String::new()))
        }
      }
      InputResult::Consumed if self.input.value() != before => {
        KeyResult::Event(SearchEvent::Changed(self.input.value().to_string()))
      }
      // While open, no key leaks through to the view
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let popup = overlay_rect(area, 3);
    frame.render_widget(Clear, popup);
    let block = Block::default()
      .title(self.title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);
    if inner.height == 0 {
      return;
    }

    let text = self.input.value();
    let split = text
      .char_indices()
      .nth(self.input.cursor_position())
      .map_or(text.len(), |(i, _)| i);
    let (head, tail) = text.split_at(split);
    let accent = Style::default().fg(Color::Yellow);
    let line = Line::from(vec![
      Span::styled("/", accent),
      Span::raw(head),
      Span::styled("_", accent),
      Span::raw(tail),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
  }
}
