use super::{centered_rect, InputResult, KeyResult, TextInput};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Events emitted by a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
  /// Text entered (trimmed, never empty)
  Submitted(String),
  /// y pressed on a confirmation
  Confirmed,
  Cancelled,
}

#[derive(Debug, Clone)]
enum PromptKind {
  Text(TextInput),
  Confirm(String),
}

/// Modal single-line text entry or yes/no confirmation
#[derive(Debug, Clone, Default)]
pub struct Prompt {
  title: String,
  kind: Option<PromptKind>,
}

impl Prompt {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.kind.is_some()
  }

  /// Ask for text, prefilled with `initial`
  pub fn ask(&mut self, title: impl Into<String>, initial: &str) {
    self.title = title.into();
    self.kind = Some(PromptKind::Text(TextInput::new().with_value(initial)));
  }

  /// Ask a yes/no question
  pub fn confirm(&mut self, title: impl Into<String>, question: impl Into<String>) {
    self.title = title.into();
    self.kind = Some(PromptKind::Confirm(question.into()));
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptEvent> {
    let Some(kind) = self.kind.as_mut() else {
      return KeyResult::NotHandled;
    };

    let event = match kind {
      PromptKind::Confirm(_) => match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => PromptEvent::Confirmed,
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
          PromptEvent::Cancelled
        }
        _ => return KeyResult::Handled,
      },
      PromptKind::Text(input) => match input.handle_key(key) {
        InputResult::Submitted(value) => {
          let value = value.trim();
          if value.is_empty() {
            return KeyResult::Handled;
          }
          PromptEvent::Submitted(value.to_string())
        }
        InputResult::Cancelled => PromptEvent::Cancelled,
        InputResult::Consumed | InputResult::NotHandled => return KeyResult::Handled,
      },
    };

    self.kind = None;
    KeyResult::Event(event)
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some(kind) = &self.kind else {
      return;
    };

    let overlay_area = centered_rect(area, (area.width * 60 / 100).max(30), 4);
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let line = match kind {
      PromptKind::Text(input) => Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Yellow)),
        Span::raw(input.value()),
        Span::styled("_", Style::default().fg(Color::Yellow)),
      ]),
      PromptKind::Confirm(question) => Line::from(vec![
        Span::raw(question.as_str()),
        Span::styled("  [y/n]", Style::default().fg(Color::Yellow)),
      ]),
    };

    let paragraph = Paragraph::new(line)
      .block(block)
      .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, overlay_area);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_text_prompt_submits_trimmed() {
    let mut prompt = Prompt::new();
    prompt.ask("New deck", "");
    for c in " Graphs ".chars() {
      prompt.handle_key(key(KeyCode::Char(c)));
    }
    assert_eq!(
      prompt.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(PromptEvent::Submitted("Graphs".to_string()))
    );
    assert!(!prompt.is_active());
  }

  #[test]
  fn test_empty_text_is_not_submitted() {
    let mut prompt = Prompt::new();
    prompt.ask("New deck", "");
    assert_eq!(prompt.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert!(prompt.is_active());
  }

  #[test]
  fn test_prefilled_value() {
    let mut prompt = Prompt::new();
    prompt.ask("Rename deck", "DP");
    prompt.handle_key(key(KeyCode::Char('!')));
    assert_eq!(
      prompt.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(PromptEvent::Submitted("DP!".to_string()))
    );
  }

  #[test]
  fn test_confirm() {
    let mut prompt = Prompt::new();
    prompt.confirm("Delete", "Delete deck Graphs?");
    assert_eq!(prompt.handle_key(key(KeyCode::Char('x'))), KeyResult::Handled);
    assert_eq!(
      prompt.handle_key(key(KeyCode::Char('y'))),
      KeyResult::Event(PromptEvent::Confirmed)
    );

    prompt.confirm("Delete", "Delete deck Graphs?");
    assert_eq!(
      prompt.handle_key(key(KeyCode::Char('n'))),
      KeyResult::Event(PromptEvent::Cancelled)
    );
  }
}
