use super::{centered_rect, KeyResult};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};
use std::collections::BTreeSet;

/// Events emitted by the tag picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPickerEvent {
  /// Enter pressed; the full selection to apply
  Applied(BTreeSet<String>),
  Cancelled,
}

/// Multi-select overlay over the known tags.
///
/// Space toggles the highlighted tag, Enter applies the selection, Esc discards edits.
#[derive(Debug, Clone, Default)]
pub struct TagPicker {
  active: bool,
  tags: Vec<String>,
  selected: BTreeSet<String>,
  cursor: usize,
}

impl TagPicker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open with every known tag and the currently applied selection
  pub fn show(&mut self, tags: Vec<String>, selected: &BTreeSet<String>) {
    self.active = true;
    self.tags = tags;
    self.selected = selected.clone();
    self.cursor = 0;
  }

  fn hide(&mut self) {
    self.active = false;
    self.tags.clear();
    self.cursor = 0;
  }

  fn toggle_current(&mut self) {
    if let Some(tag) = self.tags.get(self.cursor) {
      if !self.selected.remove(tag) {
        self.selected.insert(tag.clone());
      }
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<TagPickerEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Event(TagPickerEvent::Cancelled)
      }
      KeyCode::Enter => {
        let selection = std::mem::take(&mut self.selected);
        self.hide();
        KeyResult::Event(TagPickerEvent::Applied(selection))
      }
      KeyCode::Char(' ') => {
        self.toggle_current();
        KeyResult::Handled
      }
      KeyCode::Char('c') => {
        self.selected.clear();
        KeyResult::Handled
      }
      KeyCode::Char('j') | KeyCode::Down => {
        if !self.tags.is_empty() {
          self.cursor = (self.cursor + 1) % self.tags.len();
        }
        KeyResult::Handled
      }
      KeyCode::Char('k') | KeyCode::Up => {
        if !self.tags.is_empty() {
          self.cursor = self.cursor.checked_sub(1).unwrap_or(self.tags.len() - 1);
        }
        KeyResult::Handled
      }
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let longest = self.tags.iter().map(|t| t.chars().count()).max().unwrap_or(10);
    let overlay_area = centered_rect(
      area,
      (longest as u16).saturating_add(10).max(30),
      (self.tags.len() as u16).saturating_add(2).max(3),
    );
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" Tags ({} selected) ", self.selected.len()))
      .title_bottom(" space:toggle  c:clear  enter:apply ");

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if self.tags.is_empty() {
      return;
    }

    let items: Vec<ListItem> = self
      .tags
      .iter()
      .map(|tag| {
        let (mark, style) = if self.selected.contains(tag) {
          ("[x] ", Style::default().fg(Color::Green))
        } else {
          ("[ ] ", Style::default().fg(Color::Cyan))
        };
        ListItem::new(Line::from(vec![
          Span::styled(mark, style),
          Span::styled(tag.as_str(), style),
        ]))
      })
      .collect();

    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default();
    state.select(Some(self.cursor));
    frame.render_stateful_widget(list, inner, &mut state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn tags() -> Vec<String> {
    vec!["Array".into(), "Graph".into(), "Tree".into()]
  }

  #[test]
  fn test_toggle_and_apply() {
    let mut picker = TagPicker::new();
    picker.show(tags(), &BTreeSet::new());

    picker.handle_key(key(KeyCode::Char(' ')));
    picker.handle_key(key(KeyCode::Down));
    picker.handle_key(key(KeyCode::Down));
    picker.handle_key(key(KeyCode::Char(' ')));

    let expected: BTreeSet<String> = ["Array".to_string(), "Tree".to_string()].into();
    assert_eq!(
      picker.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(TagPickerEvent::Applied(expected))
    );
    assert!(!picker.is_active());
  }

  #[test]
  fn test_toggle_removes_existing_selection() {
    let mut picker = TagPicker::new();
    let current: BTreeSet<String> = ["Array".to_string()].into();
    picker.show(tags(), &current);

    picker.handle_key(key(KeyCode::Char(' ')));
    assert_eq!(
      picker.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(TagPickerEvent::Applied(BTreeSet::new()))
    );
  }

  #[test]
  fn test_cursor_wraps() {
    let mut picker = TagPicker::new();
    picker.show(tags(), &BTreeSet::new());
    picker.handle_key(key(KeyCode::Up));
    picker.handle_key(key(KeyCode::Char(' ')));

    let expected: BTreeSet<String> = ["Tree".to_string()].into();
    assert_eq!(
      picker.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(TagPickerEvent::Applied(expected))
    );
  }

  #[test]
  fn test_cancel_discards() {
    let mut picker = TagPicker::new();
    picker.show(tags(), &BTreeSet::new());
    picker.handle_key(key(KeyCode::Char(' ')));
    assert_eq!(
      picker.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(TagPickerEvent::Cancelled)
    );
    assert_eq!(picker.handle_key(key(KeyCode::Enter)), KeyResult::NotHandled);
  }
}
