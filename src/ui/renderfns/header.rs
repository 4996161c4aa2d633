use crate::ui::view::{sorted_shortcuts, ShortcutInfo};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// What the header shows besides shortcuts
pub struct HeaderInfo<'a> {
  pub title: &'a str,
  pub online: bool,
  pub context: Option<String>,
}

/// Draw the header bar: title, connectivity, view context and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, info: &HeaderInfo, shortcuts: Vec<ShortcutInfo>) {
  let separator = Span::styled("│", Style::default().fg(Color::DarkGray));
  let (status, status_style) = if info.online {
    ("online", Style::default().fg(Color::Green))
  } else {
    ("offline", Style::default().fg(Color::Red).bold())
  };

  let mut spans = vec![
    Span::styled(" devdecks ", Style::default().fg(Color::Cyan).bold()),
    separator.clone(),
    Span::styled(format!(" {} ", info.title), Style::default().fg(Color::White)),
    separator.clone(),
    Span::styled(format!(" {} ", status), status_style),
  ];

  if let Some(context) = &info.context {
    spans.push(separator);
    spans.push(Span::styled(
      format!(" {} ", context),
      Style::default().fg(Color::Yellow).bold(),
    ));
  }

  spans.push(Span::raw(" "));
  for shortcut in sorted_shortcuts(shortcuts) {
    spans.push(Span::styled(
      format!(" <{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {} ", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Host (and port) of the API URL, for the header title
pub fn extract_host(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_host() {
    assert_eq!(extract_host("https://api.devdecks.dev/api/"), "api.devdecks.dev");
    assert_eq!(extract_host("http://localhost:5000/api"), "localhost:5000");
    assert_eq!(extract_host("devdecks.local"), "devdecks.local");
  }
}
