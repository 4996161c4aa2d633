use crate::app::AppContext;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{DeckListView, ProblemListView};
use chrono::{DateTime, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Welcome screen, shown once per session
pub struct LandingView {
  ctx: AppContext,
  started_at: DateTime<Utc>,
}

impl LandingView {
  pub fn new(ctx: AppContext, started_at: DateTime<Utc>) -> Self {
    Self { ctx, started_at }
  }
}

impl View for LandingView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('d') | KeyCode::Enter => {
        ViewAction::Push(Box::new(DeckListView::new(self.ctx.clone())))
      }
      KeyCode::Char('p') => ViewAction::Push(Box::new(ProblemListView::new(self.ctx.clone()))),
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" Welcome ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan).bold());
    let dim = |t: &'static str| Span::styled(t, Style::default().fg(Color::DarkGray));
    let started = self.started_at.with_timezone(&Local).format("%H:%M");

    let lines = vec![
      Line::from(""),
      Line::from(Span::styled(
        "DevDecks",
        Style::default().fg(Color::Cyan).bold(),
      )),
      Line::from("Flashcards for interview prep, plus a rated problem list."),
      Line::from(""),
      Line::from(vec![key("d"), dim("  browse decks and flashcards")]),
      Line::from(vec![key("p"), dim("  problem list: sort, filter by tag and rating")]),
      Line::from(vec![key(":"), dim("  command palette (:decks, :problems, :quit)")]),
      Line::from(""),
      Line::from(dim("This screen is shown once per session; :home brings it back.")),
      Line::from(Span::styled(
        format!("Session started {}", started),
        Style::default().fg(Color::DarkGray),
      )),
    ];

    let paragraph = Paragraph::new(lines)
      .block(block)
      .alignment(Alignment::Center)
      .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Home".to_string()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("d", "decks").with_priority(20),
      ShortcutInfo::new("p", "problems").with_priority(21),
      ShortcutInfo::new("q", "quit").with_priority(30),
    ]
  }
}
