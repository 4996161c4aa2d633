use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;

/// Application events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and query polling
  Tick,
  /// Terminal window regained focus
  FocusGained,
  /// Terminal window lost focus
  FocusLost,
  /// Terminal resized; redraw
  Resize,
}

impl Event {
  fn from_crossterm(event: CrosstermEvent) -> Option<Self> {
    match event {
      // Windows reports both press and release
      CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
      CrosstermEvent::FocusGained => Some(Event::FocusGained),
      CrosstermEvent::FocusLost => Some(Event::FocusLost),
      CrosstermEvent::Resize(_, _) => Some(Event::Resize),
      _ => None,
    }
  }
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Terminal reads block, so they get their own thread
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(evt) => Event::from_crossterm(evt),
          Err(_) => None,
        }
      } else {
        Some(Event::Tick)
      };

      if let Some(event) = event {
        if tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::{KeyCode, KeyModifiers};

  #[test]
  fn test_focus_events_are_forwarded() {
    assert_eq!(
      Event::from_crossterm(CrosstermEvent::FocusGained),
      Some(Event::FocusGained)
    );
    assert_eq!(
      Event::from_crossterm(CrosstermEvent::FocusLost),
      Some(Event::FocusLost)
    );
  }

  #[test]
  fn test_only_key_presses_are_forwarded() {
    let press = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
    assert_eq!(
      Event::from_crossterm(CrosstermEvent::Key(press)),
      Some(Event::Key(press))
    );

    let mut release = press;
    release.kind = KeyEventKind::Release;
    assert_eq!(Event::from_crossterm(CrosstermEvent::Key(release)), None);
  }
}
