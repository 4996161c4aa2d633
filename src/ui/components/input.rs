use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What a key did to a [`TextInput`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult {
  /// Edited or moved; stay in the input
  Consumed,
  /// Enter, with the current text
  Submitted(String),
  /// Esc
  Cancelled,
  /// Not an editing key; the caller may use it
  NotHandled,
}

/// Cursor motions and deletions, decoupled from the keys that trigger them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
  Insert(char),
  DeleteBack,
  DeleteForward,
  DeleteWordBack,
  DeleteToStart,
  Left,
  Right,
  Start,
  End,
}

impl Edit {
  /// Readline-style bindings
  fn from_key(key: KeyEvent) -> Option<Self> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let edit = match key.code {
      KeyCode::Char('a') if ctrl => Self::Start,
      KeyCode::Char('e') if ctrl => Self::End,
      KeyCode::Char('u') if ctrl => Self::DeleteToStart,
      KeyCode::Char('w') if ctrl => Self::DeleteWordBack,
      KeyCode::Char(_) if ctrl => return None,
      KeyCode::Char(c) => Self::Insert(c),
      KeyCode::Backspace => Self::DeleteBack,
      KeyCode::Delete => Self::DeleteForward,
      KeyCode::Left => Self::Left,
      KeyCode::Right => Self::Right,
      KeyCode::Home => Self::Start,
      KeyCode::End => Self::End,
      _ => return None,
    };
    Some(edit)
  }
}

/// Single-line text field shared by the search, command and prompt overlays.
///
/// The cursor is a character index, so non-ASCII titles edit cleanly.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  text: String,
  cursor: usize,
  digits_only: bool,
}

impl TextInput {
  pub fn new() -> Self {
    Self::default()
  }

  /// Field that drops everything except ASCII digits
  pub fn digits() -> Self {
    Self {
      digits_only: true,
      ..Self::default()
    }
  }

  pub fn with_value(mut self, value: &str) -> Self {
    self.set_value(value);
    self
  }

  pub fn value(&self) -> &str {
    &self.text
  }

  /// Replace the text and park the cursor after it
  pub fn set_value(&mut self, value: &str) {
    self.text = value.chars().filter(|c| self.accepts(*c)).collect();
    self.cursor = self.len();
  }

  pub fn is_empty(&self) -> bool {
    self.text.is_empty()
  }

  pub fn clear(&mut self) {
    self.text.clear();
    self.cursor = 0;
  }

  /// Cursor, in characters from the start
  pub fn cursor_position(&self) -> usize {
    self.cursor
  }

  fn accepts(&self, c: char) -> bool {
    !self.digits_only || c.is_ascii_digit()
  }

  fn len(&self) -> usize {
    self.text.chars().count()
  }

  /// Byte offset of the `n`-th character (or the end)
  fn offset(&self, n: usize) -> usize {
    self
      .text
      .char_indices()
      .nth(n)
      .map_or(self.text.len(), |(i, _)| i)
  }

  /// Remove characters `from..to` and leave the cursor at `from`
  fn remove_range(&mut self, from: usize, to: usize) {
    let (start, end) = (self.offset(from), self.offset(to));
    self.text.replace_range(start..end, "");
    self.cursor = from;
  }

  /// Character index where the word before the cursor starts
  fn word_start(&self) -> usize {
    let before: Vec<char> = self.text.chars().take(self.cursor).collect();
    let mut i = before.len();
    while i > 0 && before[i - 1] == ' ' {
      i -= 1;
    }
    while i > 0 && before[i - 1] != ' ' {
      i -= 1;
    }
    i
  }

  fn apply(&mut self, edit: Edit) {
    match edit {
      Edit::Insert(c) => {
        if self.accepts(c) {
          let at = self.offset(self.cursor);
          self.text.insert(at, c);
          self.cursor += 1;
        }
      }
      Edit::DeleteBack if self.cursor > 0 => self.remove_range(self.cursor - 1, self.cursor),
      Edit::DeleteForward if self.cursor < self.len() => {
        self.remove_range(self.cursor, self.cursor + 1)
      }
      Edit::DeleteWordBack => self.remove_range(self.word_start(), self.cursor),
      Edit::DeleteToStart => self.remove_range(0, self.cursor),
      Edit::Left => self.cursor = self.cursor.saturating_sub(1),
      Edit::Right => self.cursor = (self.cursor + 1).min(self.len()),
      Edit::Start => self.cursor = 0,
      Edit::End => self.cursor = self.len(),
      Edit::DeleteBack | Edit::DeleteForward => {}
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> InputResult {
    match key.code {
      KeyCode::Esc => return InputResult::Cancelled,
      KeyCode::Enter => return InputResult::Submitted(self.text.clone()),
      _ => {}
    }
    match Edit::from_key(key) {
      Some(edit) => {
        self.apply(edit);
        InputResult::Consumed
      }
      None => InputResult::NotHandled,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn press(input: &mut TextInput, code: KeyCode) -> InputResult {
    input.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
  }

  fn ctrl(input: &mut TextInput, c: char) -> InputResult {
    input.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
  }

  fn type_text(input: &mut TextInput, text: &str) {
    for c in text.chars() {
      press(input, KeyCode::Char(c));
    }
  }

  #[test]
  fn test_typing_appends() {
    let mut input = TextInput::new();
    assert!(input.is_empty());
    type_text(&mut input, "two sum");
    assert_eq!(input.value(), "two sum");
    assert_eq!(input.cursor_position(), 7);
  }

  #[test]
  fn test_enter_submits_and_esc_cancels() {
    let mut input = TextInput::new().with_value("tree");
    assert_eq!(
      press(&mut input, KeyCode::Enter),
      InputResult::Submitted("tree".to_string())
    );
    assert_eq!(press(&mut input, KeyCode::Esc), InputResult::Cancelled);
    assert_eq!(press(&mut input, KeyCode::F(2)), InputResult::NotHandled);
  }

  #[test]
  fn test_insert_and_delete_mid_text() {
    let mut input = TextInput::new().with_value("ac");
    press(&mut input, KeyCode::Left);
    press(&mut input, KeyCode::Char('b'));
    assert_eq!(input.value(), "abc");

    press(&mut input, KeyCode::Delete);
    assert_eq!(input.value(), "ab");
    press(&mut input, KeyCode::Delete);
    assert_eq!(input.value(), "ab");

    press(&mut input, KeyCode::Home);
    press(&mut input, KeyCode::Backspace);
    assert_eq!(input.value(), "ab");
  }

  #[test]
  fn test_multibyte_editing() {
    let mut input = TextInput::new().with_value("día");
    press(&mut input, KeyCode::Left);
    press(&mut input, KeyCode::Backspace);
    assert_eq!(input.value(), "da");
    assert_eq!(input.cursor_position(), 1);
  }

  #[test]
  fn test_ctrl_u_keeps_text_after_cursor() {
    let mut input = TextInput::new().with_value("hello world");
    for _ in 0..5 {
      press(&mut input, KeyCode::Left);
    }
    ctrl(&mut input, 'u');
    assert_eq!(input.value(), "world");
    assert_eq!(input.cursor_position(), 0);
  }

  #[test]
  fn test_ctrl_w_deletes_previous_word() {
    let mut input = TextInput::new().with_value("binary search  ");
    ctrl(&mut input, 'w');
    assert_eq!(input.value(), "binary ");
    assert_eq!(input.cursor_position(), 7);

    ctrl(&mut input, 'w');
    assert!(input.is_empty());
  }

  #[test]
  fn test_other_ctrl_chars_pass_through() {
    let mut input = TextInput::new();
    assert_eq!(ctrl(&mut input, 'c'), InputResult::NotHandled);
    assert!(input.is_empty());
  }

  #[test]
  fn test_digits_only() {
    let mut input = TextInput::digits();
    type_text(&mut input, "1a5-0");
    assert_eq!(input.value(), "150");

    input.set_value("2,000");
    assert_eq!(input.value(), "2000");
  }
}
