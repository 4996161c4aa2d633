use crate::api::types::{Deck, Flashcard, ListFilters, NewFlashcard, Paginated};
use crate::api::FlashcardService;
use crate::app::AppContext;
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{KeyResult, Prompt, PromptEvent};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{difficulty_color, truncate, Notice};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::FlashcardDetailView;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use tracing::error;

const CARD_PAGE_SIZE: u32 = 20;

enum CardPrompt {
  Question,
  Answer { question: String },
  Delete(String),
}

/// One deck and a page of its flashcards
pub struct DeckDetailView {
  ctx: AppContext,
  deck_id: String,
  /// Shown until the detail query lands
  deck_name: String,
  deck: Query<Deck>,
  cards: Query<Paginated<Flashcard>>,
  page: u32,
  list_state: ListState,
  prompt: Prompt,
  prompt_for: Option<CardPrompt>,
  writes: Mutation<String>,
  notice: Option<Notice>,
}

impl DeckDetailView {
  pub fn new(ctx: AppContext, deck: &Deck) -> Self {
    let mut deck_query = ctx.decks.detail_query(&deck.id);
    deck_query.fetch();
    let mut cards = ctx.flashcards.list_query(Self::filters(&deck.id, 1));
    cards.fetch();

    Self {
      ctx,
      deck_id: deck.id.clone(),
      deck_name: deck.name.clone(),
      deck: deck_query,
      cards,
      page: 1,
      list_state: ListState::default(),
      prompt: Prompt::new(),
      prompt_for: None,
      writes: Mutation::new(),
      notice: None,
    }
  }

  fn filters(deck_id: &str, page: u32) -> ListFilters {
    ListFilters::page(page, CARD_PAGE_SIZE).with_deck(deck_id)
  }

  fn name(&self) -> &str {
    self
      .deck
      .data()
      .map(|d| d.name.as_str())
      .unwrap_or(&self.deck_name)
  }

  fn cards(&self) -> &[Flashcard] {
    self.cards.data().map(|p| p.data.as_slice()).unwrap_or(&[])
  }

  fn selected_card(&self) -> Option<&Flashcard> {
    self.list_state.selected().and_then(|i| self.cards().get(i))
  }

  fn change_page(&mut self, forward: bool) {
    let Some(page) = self.cards.data() else {
      return;
    };
    if forward && page.has_next() {
      self.page += 1;
    } else if !forward && page.has_prev() {
      self.page -= 1;
    } else {
      return;
    }
    self.cards = self
      .ctx
      .flashcards
      .list_query(Self::filters(&self.deck_id, self.page));
    self.cards.fetch();
    self.list_state.select(Some(0));
  }

  fn handle_prompt(&mut self, event: PromptEvent) {
    let Some(purpose) = self.prompt_for.take() else {
      return;
    };
    match (purpose, event) {
      (CardPrompt::Question, PromptEvent::Submitted(question)) => {
        // Second step: the answer
        self.prompt_for = Some(CardPrompt::Answer { question });
        self.prompt.ask("Answer", "");
      }
      (CardPrompt::Answer { question }, PromptEvent::Submitted(answer)) => {
        let card = NewFlashcard {
          question,
          answer,
          deck: self.deck_id.clone(),
          difficulty: None,
        };
        self
          .writes
          .start(create_card(self.ctx.flashcards.clone(), card));
      }
      (CardPrompt::Delete(id), PromptEvent::Confirmed) => {
        self.writes.start(delete_card(self.ctx.flashcards.clone(), id));
      }
      _ => {}
    }
  }

  fn render_header(&self, frame: &mut Frame, area: Rect) {
    let Some(deck) = self.deck.data() else {
      let text = match self.deck.state() {
        QueryState::Error(e) => format!("Failed to load deck: {}", e),
        _ => "Loading deck...".to_string(),
      };
      frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    };

    let mut lines = vec![Line::from(vec![
      Span::styled("Type: ", Style::default().fg(Color::DarkGray)),
      Span::styled(
        deck.deck_type.as_deref().unwrap_or("-"),
        Style::default().fg(Color::Yellow),
      ),
      Span::raw("   "),
      Span::styled("Cards: ", Style::default().fg(Color::DarkGray)),
      Span::raw(
        deck
          .flashcard_count
          .map(|n| n.to_string())
          .unwrap_or_else(|| "-".to_string()),
      ),
    ])];
    if let Some(description) = deck.description.as_deref() {
      lines.push(Line::from(description));
    }
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
  }

  fn render_cards(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.cards().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match (self.cards.state(), self.cards.data()) {
      (QueryState::Loading, _) => " Flashcards (loading...) ".to_string(),
      (QueryState::Error(e), None) => format!(" Flashcards (error: {}) ", e),
      (_, Some(page)) => format!(
        " Flashcards ({}, page {}/{}) ",
        page.total,
        page.page,
        page.total_pages.max(1)
      ),
      _ => " Flashcards ".to_string(),
    };
    let mut block = Block::default()
      .title(title)
      .borders(Borders::TOP)
      .border_style(Style::default().fg(Color::DarkGray));
    if let Some(notice) = &self.notice {
      let color = if notice.is_error { Color::Red } else { Color::Green };
      block = block.title_bottom(Line::styled(
        format!(" {} ", notice.text),
        Style::default().fg(color),
      ));
    }

    if self.cards().is_empty() && !self.cards.is_loading() {
      let content = if self.cards.is_error() {
        "Failed to load flashcards. Press 'r' to retry."
      } else {
        "No flashcards in this deck. Press 'n' to add one."
      };
      frame.render_widget(
        Paragraph::new(content)
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    let items: Vec<ListItem> = self
      .cards()
      .iter()
      .map(|card| {
        let difficulty = card.difficulty.as_deref().unwrap_or("");
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<8}", truncate(difficulty, 8)),
            Style::default().fg(difficulty_color(difficulty)),
          ),
          Span::raw(" "),
          Span::raw(truncate(&card.question, 80)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

async fn create_card(flashcards: FlashcardService, card: NewFlashcard) -> Result<String> {
  flashcards.create(card).await?;
  Ok("Flashcard added".to_string())
}

async fn delete_card(flashcards: FlashcardService, id: String) -> Result<String> {
  flashcards.delete(&id).await?;
  Ok("Flashcard deleted".to_string())
}

impl View for DeckDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Event(event) => {
        self.handle_prompt(event);
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('l') | KeyCode::Right => self.change_page(true),
      KeyCode::Char('h') | KeyCode::Left => self.change_page(false),
      KeyCode::Char('r') => {
        self.deck.refetch();
        self.cards.refetch();
      }
      KeyCode::Char('n') => {
        self.prompt_for = Some(CardPrompt::Question);
        self.prompt.ask("New flashcard: question", "");
      }
      KeyCode::Char('d') => {
        if let Some(card) = self.selected_card() {
          let id = card.id.clone();
          let question = format!("Delete \"{}\"?", truncate(&card.question, 40));
          self.prompt_for = Some(CardPrompt::Delete(id));
          self.prompt.confirm("Delete flashcard", question);
        }
      }
      KeyCode::Enter => {
        if let Some(card) = self.selected_card() {
          // The list already has the card; skip a loading state on open
          self.ctx.flashcards.prime(card);
          return ViewAction::Push(Box::new(FlashcardDetailView::new(
            self.ctx.clone(),
            card.id.clone(),
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" {} ", self.name()))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(3), Constraint::Min(1)])
      .split(inner);

    self.render_header(frame, chunks[0]);
    self.render_cards(frame, chunks[1]);
    self.prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    truncate(self.name(), 24)
  }

  fn context(&self) -> Option<String> {
    Some(self.name().to_string())
  }

  fn tick(&mut self) {
    self.deck.poll();
    self.cards.poll();
    if self.writes.poll() {
      self.notice = match self.writes.take() {
        Some(Ok(message)) => Some(Notice::info(message)),
        Some(Err(e)) => {
          error!(error = %e, deck = %self.deck_id, "Flashcard change failed");
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
      ShortcutInfo::new("h/l", "page").with_priority(25),
      ShortcutInfo::new("n", "new card").with_priority(40),
      ShortcutInfo::new("d", "delete").with_priority(42),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
