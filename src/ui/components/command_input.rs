use super::{overlay_rect, InputResult, KeyResult, TextInput};
use crate::commands::{get_suggestions, AppCommand, Command};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

const MAX_SUGGESTIONS: usize = 8;

/// Events emitted by the command palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  /// A known command was chosen
  Run(AppCommand),
  /// Input matched no command
  Unknown(String),
  Cancelled,
}

/// `:` command palette with ranked suggestions
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  /// `Some` while the palette is open
  open: Option<Palette>,
}

#[derive(Debug, Clone, Default)]
struct Palette {
  input: TextInput,
  highlighted: usize,
}

impl Palette {
  fn suggestions(&self) -> Vec<&'static Command> {
    get_suggestions(self.input.value())
  }

  /// Move the highlight by `step`, wrapping around the visible suggestions
  fn cycle(&mut self, step: isize) {
    let count = self.suggestions().len().min(MAX_SUGGESTIONS);
    if count == 0 {
      return;
    }
    let next = (self.highlighted as isize + step).rem_euclid(count as isize);
    self.highlighted = next as usize;
  }

  /// The highlighted suggestion, or an exact name typed past the list
  fn resolve(&self) -> CommandEvent {
    if let Some(cmd) = self.suggestions().get(self.highlighted) {
      return CommandEvent::Run(cmd.action);
    }
    let typed = self.input.value().trim();
    match AppCommand::parse(typed) {
      Some(cmd) => CommandEvent::Run(cmd),
      None => CommandEvent::Unknown(typed.to_lowercase()),
    }
  }
}

impl CommandInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.open.is_some()
  }

  /// Offer a key; `:` opens the palette when it is closed.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if self.open.is_none() {
      if key.code != KeyCode::Char(':') {
        return KeyResult::NotHandled;
      }
      self.open = Some(Palette::default());
      return KeyResult::Handled;
    }
    let Some(palette) = self.open.as_mut() else {
      return KeyResult::NotHandled;
    };

    match key.code {
      KeyCode::Tab | KeyCode::Down => palette.cycle(1),
      KeyCode::BackTab | KeyCode::Up => palette.cycle(-1),
      _ => match palette.input.handle_key(key) {
        InputResult::Submitted(_) => {
          let event = palette.resolve();
          self.open = None;
          return KeyResult::Event(event);
        }
        InputResult::Cancelled => {
          self.open = None;
          return KeyResult::Event(CommandEvent::Cancelled);
        }
        // Typing reranks the list; start again from the best match
        InputResult::Consumed => palette.highlighted = 0,
        InputResult::NotHandled => {}
      },
    }
    KeyResult::Handled
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some(palette) = &self.open else {
      return;
    };

    let suggestions = palette.suggestions();
    let shown = suggestions.len().min(MAX_SUGGESTIONS);
    let popup = overlay_rect(area, 3 + shown as u16);
    frame.render_widget(Clear, popup);

    let accent = Style::default().fg(Color::Yellow);
    let block = Block::default()
      .title(" Command ")
      .borders(Borders::ALL)
      .border_style(accent);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);
    if inner.height == 0 {
      return;
    }

    let [prompt_area, list_area] =
      Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(inner);
    let prompt = Line::from(vec![
      Span::styled(":", accent),
      Span::raw(palette.input.value()),
      Span::styled("_", accent),
    ]);
    frame.render_widget(Paragraph::new(prompt), prompt_area);

    if shown == 0 || list_area.height == 0 {
      return;
    }
    let items: Vec<ListItem> = suggestions
      .iter()
      .take(shown)
      .map(|cmd| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<10}", cmd.name), Style::default().fg(Color::Cyan)),
          Span::styled(
            format!("{:<18}", cmd.aliases.join(", ")),
            Style::default().fg(Color::Blue),
          ),
          Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();
    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default().with_selected(Some(palette.highlighted));
    frame.render_stateful_widget(list, list_area, &mut state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn open_with(text: &str) -> CommandInput {
    let mut cmd = CommandInput::new();
    assert_eq!(cmd.handle_key(key(KeyCode::Char(':'))), KeyResult::Handled);
    for c in text.chars() {
      cmd.handle_key(key(KeyCode::Char(c)));
    }
    cmd
  }

  #[test]
  fn test_submit_resolves_prefix() {
    let mut cmd = open_with("prob");
    assert_eq!(
      cmd.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(CommandEvent::Run(AppCommand::Problems))
    );
    assert!(!cmd.is_active());
  }

  #[test]
  fn test_tab_and_backtab_wrap() {
    let mut cmd = open_with("");
    cmd.handle_key(key(KeyCode::Tab));
    assert_eq!(
      cmd.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(CommandEvent::Run(AppCommand::Problems))
    );

    let mut cmd = open_with("");
    cmd.handle_key(key(KeyCode::BackTab));
    assert_eq!(
      cmd.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(CommandEvent::Run(AppCommand::Quit))
    );
  }

  #[test]
  fn test_typing_resets_highlight() {
    let mut cmd = open_with("");
    cmd.handle_key(key(KeyCode::Down));
    cmd.handle_key(key(KeyCode::Char('h')));
    assert_eq!(
      cmd.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(CommandEvent::Run(AppCommand::Home))
    );
  }

  #[test]
  fn test_unknown_command() {
    let mut cmd = open_with("zzz");
    assert_eq!(
      cmd.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(CommandEvent::Unknown("zzz".to_string()))
    );
  }

  #[test]
  fn test_escape_closes() {
    let mut cmd = open_with("de");
    assert_eq!(
      cmd.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(CommandEvent::Cancelled)
    );
    assert!(!cmd.is_active());
  }

  #[test]
  fn test_inactive_ignores_keys() {
    let mut cmd = CommandInput::new();
    assert_eq!(cmd.handle_key(key(KeyCode::Char('q'))), KeyResult::NotHandled);
  }
}
