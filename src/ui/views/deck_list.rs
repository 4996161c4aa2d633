use crate::api::DeckService;
use crate::api::types::{Deck, DeckUpdate, ListFilters, NewDeck, Paginated};
use crate::app::AppContext;
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{KeyResult, Prompt, PromptEvent, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{truncate, Notice};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::DeckDetailView;
use chrono::Local;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::error;

/// Decks per server page
const DECK_PAGE_SIZE: u32 = 20;

async fn create_deck(decks: DeckService, name: String) -> Result<String> {
  let deck = decks
    .create(NewDeck {
      name,
      ..NewDeck::default()
    })
    .await?;
  Ok(format!("Created deck {}", deck.name))
}

async fn rename_deck(decks: DeckService, id: String, name: String) -> Result<String> {
  let update = DeckUpdate {
    name: Some(name),
    ..DeckUpdate::default()
  };
  let deck = decks.update(&id, update).await?;
  Ok(format!("Renamed deck to {}", deck.name))
}

async fn delete_deck(decks: DeckService, id: String) -> Result<String> {
  decks.delete(&id).await?;
  Ok("Deck deleted".to_string())
}

/// What the open prompt is asking for
enum DeckPrompt {
  Create,
  Rename(String),
  Delete(String),
}

/// Server-paginated, searchable list of decks
pub struct DeckListView {
  ctx: AppContext,
  page: u32,
  query: Query<Paginated<Deck>>,
  list_state: ListState,
  search: SearchInput,
  prompt: Prompt,
  prompt_for: Option<DeckPrompt>,
  writes: Mutation<String>,
  notice: Option<Notice>,
}

impl DeckListView {
  pub fn new(ctx: AppContext) -> Self {
    let search = SearchInput::new(" Search decks ");
    let mut query = ctx.decks.list_query(ListFilters::page(1, DECK_PAGE_SIZE));
    query.fetch();

    Self {
      ctx,
      page: 1,
      query,
      list_state: ListState::default(),
      search,
      prompt: Prompt::new(),
      prompt_for: None,
      writes: Mutation::new(),
      notice: None,
    }
  }

  /// Start loading the first page before the view is opened.
  pub fn prefetch(ctx: &AppContext) {
    ctx.decks.prefetch_list(ListFilters::page(1, DECK_PAGE_SIZE));
  }

  fn filters(&self) -> ListFilters {
    ListFilters::page(self.page, DECK_PAGE_SIZE).with_search(self.search.query())
  }

  /// Point the query at the current page and search
  fn reload(&mut self) {
    self.query = self.ctx.decks.list_query(self.filters());
    self.query.fetch();
    self.list_state.select(Some(0));
  }

  fn decks(&self) -> &[Deck] {
    self.query.data().map(|p| p.data.as_slice()).unwrap_or(&[])
  }

  fn selected_deck(&self) -> Option<&Deck> {
    self.list_state.selected().and_then(|i| self.decks().get(i))
  }

  fn change_page(&mut self, forward: bool) {
    let Some(page) = self.query.data() else {
      return;
    };
    if forward && page.has_next() {
      self.page += 1;
    } else if !forward && page.has_prev() {
      self.page -= 1;
    } else {
      return;
    }
    self.reload();
  }

  fn handle_prompt(&mut self, event: PromptEvent) {
    let Some(purpose) = self.prompt_for.take() else {
      return;
    };
    let decks = self.ctx.decks.clone();
    match (purpose, event) {
      (DeckPrompt::Create, PromptEvent::Submitted(name)) => {
        self.writes.start(create_deck(decks, name));
      }
      (DeckPrompt::Rename(id), PromptEvent::Submitted(name)) => {
        self.writes.start(rename_deck(decks, id, name));
      }
      (DeckPrompt::Delete(id), PromptEvent::Confirmed) => {
        self.writes.start(delete_deck(decks, id));
      }
      _ => {}
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.decks().len();
    ensure_valid_selection(&mut self.list_state, len);

    let search = match self.search.query() {
      "" => String::new(),
      q => format!(" /{}", q),
    };
    let title = match (self.query.state(), self.query.data()) {
      (QueryState::Loading, _) => match self.query.retry_count() {
        0 => format!(" Decks{} (loading...) ", search),
        n => format!(" Decks{} (loading, retry {}...) ", search, n),
      },
      (QueryState::Error(e), None) => format!(" Decks{} (error: {}) ", search, e),
      (_, Some(page)) => format!(
        " Decks{} ({} total, page {}/{}){} ",
        search,
        page.total,
        page.page,
        page.total_pages.max(1),
        if self.query.is_fetching() { " ~" } else { "" },
      ),
      _ => format!(" Decks{} ", search),
    };
    let updated = self
      .query
      .updated_at()
      .map(|at| format!(" updated {} ", at.with_timezone(&Local).format("%H:%M:%S")))
      .unwrap_or_default();

    let mut block = Block::default()
      .title(title)
      .title(Line::styled(updated, Style::default().fg(Color::DarkGray)).right_aligned())
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

    if self.decks().is_empty() && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load decks. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "No decks match the search."
      } else {
        "No decks yet. Press 'n' to create one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .decks()
      .iter()
      .map(|deck| {
        let count = deck
          .flashcard_count
          .map(|n| format!("{:>4} cards", n))
          .unwrap_or_default();
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<28}", truncate(&deck.name, 28)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<8}", truncate(deck.deck_type.as_deref().unwrap_or("-"), 8)),
            Style::default().fg(Color::Yellow),
          ),
          Span::styled(format!("{:<11}", count), Style::default().fg(Color::DarkGray)),
          Span::raw(" "),
          Span::raw(truncate(deck.description.as_deref().unwrap_or(""), 50)),
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

impl View for DeckListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.prompt.handle_key(key) {
      KeyResult::Event(event) => {
        self.handle_prompt(event);
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(_)) => {
        // A new search starts from the first page
        self.page = 1;
        self.reload();
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('l') | KeyCode::Right => self.change_page(true),
      KeyCode::Char('h') | KeyCode::Left => self.change_page(false),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('n') => {
        self.prompt_for = Some(DeckPrompt::Create);
        self.prompt.ask("New deck name", "");
      }
      KeyCode::Char('e') => {
        if let Some(deck) = self.selected_deck() {
          let (id, name) = (deck.id.clone(), deck.name.clone());
          self.prompt_for = Some(DeckPrompt::Rename(id));
          self.prompt.ask("Rename deck", &name);
        }
      }
      KeyCode::Char('d') => {
        if let Some(deck) = self.selected_deck() {
          let (id, question) = (deck.id.clone(), format!("Delete deck {}?", deck.name));
          self.prompt_for = Some(DeckPrompt::Delete(id));
          self.prompt.confirm("Delete deck", question);
        }
      }
      KeyCode::Enter => {
        if let Some(deck) = self.selected_deck() {
          return ViewAction::Push(Box::new(DeckDetailView::new(self.ctx.clone(), deck)));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.search.render_overlay(frame, area);
    self.prompt.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Decks".to_string()
  }

  fn context(&self) -> Option<String> {
    Some(format!("page {}", self.page))
  }

  fn tick(&mut self) {
    self.query.poll();
    if self.writes.poll() {
      self.notice = match self.writes.take() {
        Some(Ok(message)) => Some(Notice::info(message)),
        Some(Err(e)) => {
          error!(error = %e, "Deck change failed");
          Some(Notice::error(e))
        }
        None => None,
      };
    }
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.prompt.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("h/l", "page").with_priority(25),
      ShortcutInfo::new("n", "new").with_priority(40),
      ShortcutInfo::new("e", "rename").with_priority(41),
      ShortcutInfo::new("d", "delete").with_priority(42),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
