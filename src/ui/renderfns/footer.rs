use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// One-line message shown at the right of the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub text: String,
  pub is_error: bool,
}

impl Notice {
  pub fn info(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      is_error: false,
    }
  }

  pub fn error(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      is_error: true,
    }
  }
}

/// Draw the footer bar with the view breadcrumb and an optional notice
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], notice: Option<&Notice>) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i == breadcrumb.len() - 1 {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    spans.push(Span::styled(part.as_str(), style));
  }

  let notice_width = notice.map(|n| n.text.chars().count() as u16 + 1).unwrap_or(0);
  let chunks = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Min(0), Constraint::Length(notice_width)])
    .split(area);

  let left = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(left, chunks[0]);

  if let Some(notice) = notice {
    let color = if notice.is_error { Color::Red } else { Color::Green };
    let right = Paragraph::new(format!("{} ", notice.text))
      .style(Style::default().fg(color).bg(Color::Black));
    frame.render_widget(right, chunks[1]);
  }
}
