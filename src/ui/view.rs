use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// Key hint shown in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  /// Sort order in the header, ascending
  pub priority: u8,
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Navigation a view asks the app for
pub enum ViewAction {
  None,
  /// Open a view on top of this one
  Push(Box<dyn View>),
  /// Close this view; closing the root quits
  Pop,
}

/// One screen of the app.
///
/// A view owns its overlays (search, pickers, prompts) and routes keys to them before
/// its own bindings. Anything backed by the network is a `Query<T>` or `Mutation<T>`
/// field, polled from `tick`.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Footer breadcrumb segment
  fn breadcrumb_label(&self) -> String;

  /// Header text next to the title, e.g. the open deck
  fn context(&self) -> Option<String> {
    None
  }

  /// Runs every tick; views poll their queries here
  fn tick(&mut self) {}

  /// True while an overlay owns the keyboard, so `:` and friends are typed, not run
  fn captures_input(&self) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

/// Shortcuts sorted for display
pub fn sorted_shortcuts(mut shortcuts: Vec<ShortcutInfo>) -> Vec<ShortcutInfo> {
  shortcuts.sort_by_key(|s| s.priority);
  shortcuts
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_shortcuts_sorted_by_priority() {
    let sorted = sorted_shortcuts(vec![
      ShortcutInfo::new("r", "refresh"),
      ShortcutInfo::new(":", "command").with_priority(10),
    ]);
    assert_eq!(sorted[0].key, ":");
    assert_eq!(sorted[1].key, "r");
  }
}
