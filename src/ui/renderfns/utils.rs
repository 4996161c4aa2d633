use ratatui::prelude::Color;

/// Truncate to at most `max_len` characters, ending in "..." when cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    return s.to_string();
  }
  let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
  format!("{}...", kept)
}

/// Display color for a problem rating
pub fn rating_color(rating: u32) -> Color {
  match rating {
    0..=1399 => Color::Green,
    1400..=1899 => Color::Yellow,
    _ => Color::Red,
  }
}

/// Display color for a flashcard difficulty label
pub fn difficulty_color(difficulty: &str) -> Color {
  match difficulty.to_ascii_lowercase().as_str() {
    "easy" => Color::Green,
    "medium" => Color::Yellow,
    "hard" => Color::Red,
    _ => Color::White,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Ñandú rápido", 8), "Ñandú...");
  }

  #[test]
  fn test_rating_color_bands() {
    assert_eq!(rating_color(1200), Color::Green);
    assert_eq!(rating_color(1400), Color::Yellow);
    assert_eq!(rating_color(2100), Color::Red);
  }

  #[test]
  fn test_difficulty_color() {
    assert_eq!(difficulty_color("Easy"), Color::Green);
    assert_eq!(difficulty_color("hard"), Color::Red);
    assert_eq!(difficulty_color(""), Color::White);
  }
}
