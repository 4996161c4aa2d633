use super::{centered_rect, InputResult, KeyResult, TextInput};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by the rating range prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeEvent {
  /// Raw bounds; an empty string means unbounded on that side
  Applied { min: String, max: String },
  Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Focus {
  #[default]
  Min,
  Max,
}

/// Two digit-only fields for a min/max rating. Tab switches fields.
#[derive(Debug, Clone)]
pub struct RangePrompt {
  active: bool,
  min: TextInput,
  max: TextInput,
  focus: Focus,
}

impl Default for RangePrompt {
  fn default() -> Self {
    Self {
      active: false,
      min: TextInput::digits(),
      max: TextInput::digits(),
      focus: Focus::Min,
    }
  }
}

impl RangePrompt {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open prefilled with the current bounds
  pub fn show(&mut self, min: Option<u32>, max: Option<u32>) {
    self.active = true;
    self.focus = Focus::Min;
    self.min.set_value(&min.map(|v| v.to_string()).unwrap_or_default());
    self.max.set_value(&max.map(|v| v.to_string()).unwrap_or_default());
  }

  fn focused(&mut self) -> &mut TextInput {
    match self.focus {
      Focus::Min => &mut self.min,
      Focus::Max => &mut self.max,
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<RangeEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
        self.focus = match self.focus {
          Focus::Min => Focus::Max,
          Focus::Max => Focus::Min,
        };
        KeyResult::Handled
      }
      _ => match self.focused().handle_key(key) {
        InputResult::Submitted(_) => {
          self.active = false;
          KeyResult::Event(RangeEvent::Applied {
            min: self.min.value().to_string(),
            max: self.max.value().to_string(),
          })
        }
        InputResult::Cancelled => {
          self.active = false;
          KeyResult::Event(RangeEvent::Cancelled)
        }
        InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
      },
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let overlay_area = centered_rect(area, 34, 4);
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Rating range ");
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    let field = |label: &'static str, input: &TextInput, focused: bool| {
      let style = if focused {
        Style::default().fg(Color::Yellow).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      let value = if input.is_empty() { "any" } else { input.value() };
      let mut spans = vec![
        Span::styled(format!("{:<5}", label), style),
        Span::styled(value.to_string(), Style::default().fg(Color::White)),
      ];
      if focused {
        spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
      }
      Line::from(spans)
    };

    let lines = vec![
      field("min", &self.min, self.focus == Focus::Min),
      field("max", &self.max, self.focus == Focus::Max),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
  }
}
