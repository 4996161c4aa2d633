use crate::api::{ApiClient, DeckService, FlashcardService, UserService};
use crate::cache::QueryClient;
use crate::commands::AppCommand;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::problems::ProblemSource;
use crate::session::Session;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{draw_footer, draw_header, extract_host, HeaderInfo, Notice};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{DeckListView, LandingView, ProblemListView};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{
  DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers,
};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Services and settings shared by every view
#[derive(Clone)]
pub struct AppContext {
  pub decks: DeckService,
  pub flashcards: FlashcardService,
  pub users: UserService,
  pub problems: ProblemSource,
  pub problem_page_size: usize,
}

impl AppContext {
  pub fn new(api: &ApiClient, cache: &QueryClient, config: &Config) -> Self {
    Self {
      decks: DeckService::new(api.clone(), cache.clone()),
      flashcards: FlashcardService::new(api.clone(), cache.clone()),
      users: UserService::new(api.clone(), cache.clone()),
      problems: config.problems.source(),
      problem_page_size: config.problems.page_size,
    }
  }
}

/// Main application state
pub struct App {
  ctx: AppContext,
  cache: QueryClient,
  /// Reports reachability as observed by the HTTP client
  connectivity: watch::Receiver<bool>,
  session: Session,
  title: String,
  /// Navigation stack; the root is always at index 0
  view_stack: Vec<Box<dyn View>>,
  command: CommandInput,
  notice: Option<Notice>,
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, api: ApiClient, cache: QueryClient) -> Self {
    let ctx = AppContext::new(&api, &cache, config);
    let title = config
      .title
      .clone()
      .unwrap_or_else(|| extract_host(api.base_url().as_str()).to_string());

    let mut app = Self {
      ctx,
      cache,
      connectivity: api.connectivity(),
      session: Session::new(),
      title,
      view_stack: Vec::new(),
      command: CommandInput::new(),
      notice: None,
      should_quit: false,
    };
    let root = app.initial_view();
    app.view_stack.push(root);
    app
  }

  /// Landing page on the first visit of this session, decks afterwards
  fn initial_view(&mut self) -> Box<dyn View> {
    if self.session.mark_visited() {
      // Decks are one keypress away from the landing page
      DeckListView::prefetch(&self.ctx);
      Box::new(LandingView::new(self.ctx.clone(), self.session.started_at()))
    } else {
      Box::new(DeckListView::new(self.ctx.clone()))
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode().map_err(|e| eyre!("Failed to enable raw mode: {}", e))?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even when the loop failed
    let _ = stdout().execute(DisableFocusChange);
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);
    info!(views = self.view_stack.len(), "Event loop started");

    while !self.should_quit {
      terminal.draw(|frame| self.draw(frame))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::FocusGained => {
        debug!("Terminal focus gained");
        self.cache.on_window_focus();
      }
      Event::FocusLost | Event::Resize => {}
    }
  }

  fn tick(&mut self) {
    if self.connectivity.has_changed().unwrap_or(false) {
      let online = *self.connectivity.borrow_and_update();
      self.cache.set_online(online);
    }
    if let Some(view) = self.view_stack.last_mut() {
      view.tick();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // Text overlays inside the view get every key, including ':'
    let view_captures = self
      .view_stack
      .last()
      .map(|v| v.captures_input())
      .unwrap_or(false);

    if !view_captures {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(cmd)) => {
          self.run_command(cmd);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(input)) => {
          self.notice = Some(Notice::error(format!("Unknown command: {}", input)));
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    self.notice = None;
    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!(view = %view.breadcrumb_label(), "Push view");
        self.view_stack.push(view);
      }
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  /// Replace the whole stack with a new root
  fn set_root(&mut self, view: Box<dyn View>) {
    self.view_stack.clear();
    self.view_stack.push(view);
  }

  fn run_command(&mut self, cmd: AppCommand) {
    debug!(?cmd, "Command");
    match cmd {
      AppCommand::Decks => self.set_root(Box::new(DeckListView::new(self.ctx.clone()))),
      AppCommand::Problems => self.set_root(Box::new(ProblemListView::new(self.ctx.clone()))),
      AppCommand::Home => self.set_root(Box::new(LandingView::new(
        self.ctx.clone(),
        self.session.started_at(),
      ))),
      AppCommand::Quit => self.should_quit = true,
    }
  }

  fn breadcrumb(&self) -> Vec<String> {
    self.view_stack.iter().map(|v| v.breadcrumb_label()).collect()
  }

  fn draw(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Header
        Constraint::Min(1),    // View
        Constraint::Length(1), // Footer
      ])
      .split(frame.area());

    let breadcrumb = self.breadcrumb();
    let online = self.cache.is_online();
    let Some(view) = self.view_stack.last_mut() else {
      return;
    };

    let header = HeaderInfo {
      title: &self.title,
      online,
      context: view.context(),
    };
    draw_header(frame, chunks[0], &header, view.shortcuts());

    view.render(frame, chunks[1]);
    self.command.render_overlay(frame, chunks[1]);

    draw_footer(frame, chunks[2], &breadcrumb, self.notice.as_ref());
  }
}
