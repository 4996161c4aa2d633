use crate::api::types::ProblemsCompleted;
use crate::api::UserService;
use crate::app::AppContext;
use crate::cache::Subscription;
use crate::problems::{all_tags, ProblemListState, ProblemRow, SortField};
use crate::query::Mutation;
use crate::ui::components::{
  KeyResult, RangeEvent, RangePrompt, SearchEvent, SearchInput, TagPicker, TagPickerEvent,
};
use crate::ui::renderfns::{rating_color, truncate, Notice};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};

/// Loading of the problem CSV, done off the UI thread
enum Rows {
  Loading(oneshot::Receiver<Result<Vec<ProblemRow>>>),
  Ready,
  Failed(String),
}

/// Filterable, sortable, paginated problem table
pub struct ProblemListView {
  users: UserService,
  rows: Rows,
  list: ProblemListState,
  table_state: TableState,
  search: SearchInput,
  tag_picker: TagPicker,
  range: RangePrompt,
  /// Keeps the completed list cached while the table is open
  completed: Subscription<ProblemsCompleted>,
  done: Option<Arc<ProblemsCompleted>>,
  completion: Mutation<Arc<ProblemsCompleted>>,
  notice: Option<Notice>,
}

impl ProblemListView {
  pub fn new(ctx: AppContext) -> Self {
    let (tx, rx) = oneshot::channel();
    let source = ctx.problems.clone();
    tokio::spawn(async move {
      let label = source.label();
      let loaded = tokio::task::spawn_blocking(move || source.load())
        .await
        .map_err(|e| eyre!("Failed to load problems from {}: {}", label, e))
        .and_then(|rows| rows);
      let _ = tx.send(loaded);
    });
    let mut completed = ctx.users.watch_completed();
    let done = completed.current().data;

    Self {
      users: ctx.users.clone(),
      rows: Rows::Loading(rx),
      list: ProblemListState::new(Arc::new(Vec::new()), ctx.problem_page_size),
      table_state: TableState::default(),
      search: SearchInput::new(" Search titles "),
      tag_picker: TagPicker::new(),
      range: RangePrompt::new(),
      completed,
      done,
      completion: Mutation::new(),
      notice: None,
    }
  }

  /// Install a loaded collection
  fn set_rows(&mut self, rows: Vec<ProblemRow>) {
    info!(count = rows.len(), "Problems loaded");
    self.list.set_rows(Arc::new(rows));
    self.rows = Rows::Ready;
    self.table_state.select(Some(0));
  }

  fn poll_rows(&mut self) {
    let Rows::Loading(rx) = &mut self.rows else {
      return;
    };
    match rx.try_recv() {
      Ok(Ok(rows)) => self.set_rows(rows),
      Ok(Err(e)) => {
        error!(error = %e, "Problem list unavailable");
        self.rows = Rows::Failed(format!("{:#}", e));
      }
      Err(oneshot::error::TryRecvError::Empty) => {}
      Err(oneshot::error::TryRecvError::Closed) => {
        self.rows = Rows::Failed("Problem loader stopped".to_string());
      }
    }
  }

  fn is_done(&self, problem_id: u32) -> bool {
    self.done.as_deref().is_some_and(|c| c.contains(problem_id))
  }

  /// Any filter, sort, or page change lands on a new page; select its first row
  fn reset_selection(&mut self) {
    self.table_state.select(Some(0));
  }

  fn selected_row(&mut self) -> Option<ProblemRow> {
    let index = self.table_state.selected()?;
    self.list.current().rows.get(index).map(|row| (*row).clone())
  }

  fn toggle_completed(&mut self) {
    if self.completion.is_pending() {
      return;
    }
    let Some(row) = self.selected_row() else {
      return;
    };
    let done = self.is_done(row.id);
    self
      .completion
      .start(set_completed(self.users.clone(), row.id, !done));
  }

  fn move_selection(&mut self, down: bool) {
    let len = self.list.current().rows.len();
    if len == 0 {
      self.table_state.select(None);
      return;
    }
    let current = self.table_state.selected().unwrap_or(0);
    let next = if down {
      (current + 1).min(len - 1)
    } else {
      current.saturating_sub(1)
    };
    self.table_state.select(Some(next));
  }

  fn filter_summary(&self) -> Line<'static> {
    let filter = self.list.filter();
    let label = |t: &'static str| Span::styled(t, Style::default().fg(Color::DarkGray));
    let mut spans = vec![label(" search: ")];
    spans.push(Span::raw(if filter.search.is_empty() {
      "-".to_string()
    } else {
      filter.search.clone()
    }));

    spans.push(label("  tags: "));
    spans.push(Span::styled(
      if filter.tags.is_empty() {
        "any".to_string()
      } else {
        filter.tags.iter().cloned().collect::<Vec<_>>().join(" | ")
      },
      Style::default().fg(Color::Magenta),
    ));

    spans.push(label("  rating: "));
    let bound = |b: Option<u32>| b.map(|v| v.to_string()).unwrap_or_else(|| "*".to_string());
    spans.push(Span::raw(format!(
      "{}..{}",
      bound(filter.min_rating),
      bound(filter.max_rating)
    )));
    Line::from(spans)
  }

  fn header_cell(&self, field: SortField) -> Cell<'static> {
    let sort = self.list.sort();
    if sort.field == field {
      Cell::from(format!("{} {}", field.label(), sort.direction.arrow()))
        .style(Style::default().fg(Color::Yellow).bold())
    } else {
      Cell::from(field.label()).style(Style::default().fg(Color::Cyan))
    }
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let done = self.done.clone();
    let header = Row::new(vec![
      Cell::from(" "),
      self.header_cell(SortField::Id),
      self.header_cell(SortField::Title),
      self.header_cell(SortField::Rating),
      Cell::from("Tags").style(Style::default().fg(Color::Cyan)),
    ]);
    let summary = self.filter_summary();
    let pending = self.completion.is_pending();

    let page = self.list.current();
    let title = format!(
      " Problems ({} matches, page {}/{}){} ",
      page.total_matches,
      page.page,
      page.total_pages,
      if pending { " saving..." } else { "" },
    );

    let rows: Vec<Row> = page
      .rows
      .iter()
      .map(|row| {
        let mark = if done.as_deref().is_some_and(|c| c.contains(row.id)) {
          Cell::from("✓").style(Style::default().fg(Color::Green))
        } else {
          Cell::from(" ")
        };
        Row::new(vec![
          mark,
          Cell::from(row.id.to_string()),
          Cell::from(truncate(&row.title, 48)),
          Cell::from(row.rating.to_string()).style(Style::default().fg(rating_color(row.rating))),
          Cell::from(row.tags.join(", ")).style(Style::default().fg(Color::DarkGray)),
        ])
      })
      .collect();
    let empty = rows.is_empty();

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

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(1)])
      .split(inner);
    frame.render_widget(Paragraph::new(summary), chunks[0]);

    if empty {
      let paragraph = Paragraph::new("No problems match the current filters. Press 'x' to clear.")
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, chunks[1]);
      return;
    }

    let widths = [
      Constraint::Length(2),
      Constraint::Length(6),
      Constraint::Min(20),
      Constraint::Length(9),
      Constraint::Percentage(35),
    ];
    let table = Table::new(rows, widths)
      .header(header)
      .row_highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");
    frame.render_stateful_widget(table, chunks[1], &mut self.table_state);
  }
}

async fn set_completed(
  users: UserService,
  problem_id: u32,
  completed: bool,
) -> Result<Arc<ProblemsCompleted>> {
  users.set_completed(problem_id, completed).await
}

impl View for ProblemListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.tag_picker.handle_key(key) {
      KeyResult::Event(TagPickerEvent::Applied(tags)) => {
        self.list.set_tags(tags);
        self.reset_selection();
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match self.range.handle_key(key) {
      KeyResult::Event(RangeEvent::Applied { min, max }) => {
        self.list.set_rating_range(&min, &max);
        self.reset_selection();
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(text)) => {
        self.list.set_search(&text);
        self.reset_selection();
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_selection(true),
      KeyCode::Char('k') | KeyCode::Up => self.move_selection(false),
      KeyCode::Char('l') | KeyCode::Right => {
        if self.list.next_page() {
          self.reset_selection();
        }
      }
      KeyCode::Char('h') | KeyCode::Left => {
        if self.list.prev_page() {
          self.reset_selection();
        }
      }
      KeyCode::Char('1') => {
        self.list.toggle_sort(SortField::Id);
        self.reset_selection();
      }
      KeyCode::Char('2') => {
        self.list.toggle_sort(SortField::Title);
        self.reset_selection();
      }
      KeyCode::Char('3') => {
        self.list.toggle_sort(SortField::Rating);
        self.reset_selection();
      }
      KeyCode::Char('t') => {
        let tags = all_tags(self.list.rows());
        self.tag_picker.show(tags, &self.list.filter().tags);
      }
      KeyCode::Char('m') => {
        let filter = self.list.filter();
        self.range.show(filter.min_rating, filter.max_rating);
      }
      KeyCode::Char('x') => {
        self.search.clear();
        self.list.clear_filters();
        self.reset_selection();
      }
      KeyCode::Char('c') | KeyCode::Enter => self.toggle_completed(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    match &self.rows {
      Rows::Loading(_) => {
        let paragraph = Paragraph::new("Loading problems...")
          .block(
            Block::default()
              .title(" Problems (loading...) ")
              .title_alignment(Alignment::Center)
              .borders(Borders::ALL)
              .border_style(Style::default().fg(Color::Blue)),
          )
          .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
      }
      Rows::Failed(e) => {
        let paragraph = Paragraph::new(format!("Could not load the problem list.\n\n{}", e))
          .block(
            Block::default()
              .title(" Problems (error) ")
              .title_alignment(Alignment::Center)
              .borders(Borders::ALL)
              .border_style(Style::default().fg(Color::Red)),
          )
          .style(Style::default().fg(Color::Red));
        frame.render_widget(paragraph, area);
      }
      Rows::Ready => self.render_table(frame, area),
    }

    self.search.render_overlay(frame, area);
    self.tag_picker.render_overlay(frame, area);
    self.range.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Problems".to_string()
  }

  fn context(&self) -> Option<String> {
    let sort = self.list.sort();
    Some(format!("sort: {} {}", sort.field.label(), sort.direction.arrow()))
  }

  fn tick(&mut self) {
    self.poll_rows();
    if self.completed.has_changed() {
      self.done = self.completed.current().data;
    }
    if self.completion.poll() {
      if let Some(Err(e)) = self.completion.take() {
        error!(error = %e, "Completion toggle failed");
        self.notice = Some(Notice::error(e));
      }
    }
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.tag_picker.is_active() || self.range.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("1/2/3", "sort").with_priority(22),
      ShortcutInfo::new("t", "tags").with_priority(23),
      ShortcutInfo::new("m", "rating").with_priority(24),
      ShortcutInfo::new("h/l", "page").with_priority(25),
      ShortcutInfo::new("c", "done").with_priority(40),
      ShortcutInfo::new("x", "clear").with_priority(41),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
