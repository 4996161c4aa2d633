use crate::api::types::{Flashcard, FlashcardUpdate};
use crate::api::FlashcardService;
use crate::app::AppContext;
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{KeyResult, Prompt, PromptEvent};
use crate::ui::renderfns::{difficulty_color, Notice};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::error;

/// Which field the edit prompt writes
#[derive(Clone, Copy)]
enum EditField {
  Question,
  Answer,
}

/// A single flashcard; the answer stays hidden until revealed
pub struct FlashcardDetailView {
  ctx: AppContext,
  card_id: String,
  query: Query<Flashcard>,
  revealed: bool,
  prompt: Prompt,
  editing: Option<EditField>,
  writes: Mutation<Flashcard>,
  notice: Option<Notice>,
}

impl FlashcardDetailView {
  pub fn new(ctx: AppContext, card_id: String) -> Self {
    let mut query = ctx.flashcards.detail_query(&card_id);
    query.fetch();

    Self {
      ctx,
      card_id,
      query,
      revealed: false,
      prompt: Prompt::new(),
      editing: None,
      writes: Mutation::new(),
      notice: None,
    }
  }

  fn start_edit(&mut self, field: EditField) {
    let Some(card) = self.query.data() else {
      return;
    };
    let (title, current) = match field {
      EditField::Question => ("Edit question", card.question.clone()),
      EditField::Answer => ("Edit answer", card.answer.clone()),
    };
    self.editing = Some(field);
    self.prompt.ask(title, &current);
  }

  fn render_card(&self, frame: &mut Frame, area: Rect, card: &Flashcard) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Metadata
        Constraint::Length(1), // Separator
        Constraint::Percentage(40),
        Constraint::Min(1),
      ])
      .split(area);

    let difficulty = card.difficulty.as_deref().unwrap_or("-");
    let mut meta = vec![
      Span::styled("Difficulty: ", Style::default().fg(Color::DarkGray)),
      Span::styled(difficulty, Style::default().fg(difficulty_color(difficulty))),
    ];
    if !card.tags.is_empty() {
      meta.push(Span::styled("   Tags: ", Style::default().fg(Color::DarkGray)));
      meta.push(Span::raw(card.tags.join(", ")));
    }
    frame.render_widget(Paragraph::new(Line::from(meta)), chunks[0]);

    let question = Paragraph::new(card.question.as_str())
      .block(
        Block::default()
          .title(" Question ")
          .borders(Borders::TOP)
          .border_style(Style::default().fg(Color::DarkGray)),
      )
      .wrap(Wrap { trim: false });
    frame.render_widget(question, chunks[2]);

    let answer = if self.revealed {
      Paragraph::new(card.answer.as_str())
    } else {
      Paragraph::new("Press space to reveal the answer.")
        .style(Style::default().fg(Color::DarkGray))
    };
    let answer = answer
      .block(
        Block::default()
          .title(" Answer ")
          .borders(Borders::TOP)
          .border_style(Style::default().fg(Color::DarkGray)),
      )
      .wrap(Wrap { trim: false });
    frame.render_widget(answer, chunks[3]);
  }
}

async fn update_card(
  flashcards: FlashcardService,
  id: String,
  update: FlashcardUpdate,
) -> Result<Flashcard> {
  flashcards.update(&id, update).await
}

impl View for FlashcardDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Event(PromptEvent::Submitted(value)) => {
        let update = match self.editing.take() {
          Some(EditField::Question) => FlashcardUpdate {
            question: Some(value),
            ..FlashcardUpdate::default()
          },
          Some(EditField::Answer) => FlashcardUpdate {
            answer: Some(value),
            ..FlashcardUpdate::default()
          },
          None => return ViewAction::None,
        };
        let flashcards = self.ctx.flashcards.clone();
        self
          .writes
          .start(update_card(flashcards, self.card_id.clone(), update));
        return ViewAction::None;
      }
      KeyResult::Event(_) => {
        self.editing = None;
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char(' ') => self.revealed = !self.revealed,
      KeyCode::Char('e') => self.start_edit(EditField::Question),
      KeyCode::Char('a') => self.start_edit(EditField::Answer),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => " Flashcard (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Flashcard (error: {}) ", e),
      _ if self.writes.is_pending() => " Flashcard (saving...) ".to_string(),
      _ => " Flashcard ".to_string(),
    };

    let mut block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    if let Some(notice) = &self.notice {
      let color = if notice.is_error { Color::Red } else { Color::Green };
      block = block.title_bottom(Line::styled(
        format!(" {} ", notice.text),
        Style::default().fg(color),
      ));
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);

    match self.query.data() {
      Some(card) => self.render_card(frame, inner, card),
      None if self.query.is_error() => {
        let paragraph = Paragraph::new("Failed to load flashcard. Press 'r' to retry.")
          .style(Style::default().fg(Color::Red));
        frame.render_widget(paragraph, inner);
      }
      None => {
        let paragraph =
          Paragraph::new("Loading flashcard...").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, inner);
      }
    }

    self.prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Flashcard".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
    if self.writes.poll() {
      self.notice = match self.writes.take() {
        Some(Ok(_)) => Some(Notice::info("Saved")),
        Some(Err(e)) => {
          error!(error = %e, card = %self.card_id, "Flashcard update failed");
          Some(Notice::error(e))
        }
        None => None,
      };
    }
  }

  fn captures_input(&self) -> bool {
    self.prompt.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("space", "reveal").with_priority(20),
      ShortcutInfo::new("e/a", "edit").with_priority(40),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
