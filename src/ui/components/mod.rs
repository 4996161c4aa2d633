mod command_input;
mod input;
mod key_result;
mod prompt;
mod range_prompt;
mod search_input;
mod tag_picker;

pub use command_input::{CommandEvent, CommandInput};
pub use input::{InputResult, TextInput};
pub use key_result::KeyResult;
pub use prompt::{Prompt, PromptEvent};
pub use range_prompt::{RangeEvent, RangePrompt};
pub use search_input::{SearchEvent, SearchInput};
pub use tag_picker::{TagPicker, TagPickerEvent};

use ratatui::layout::Rect;

/// Top-left anchored overlay for palette-style inputs
pub(crate) fn overlay_rect(area: Rect, height: u16) -> Rect {
  let width = (area.width * 60 / 100).clamp(30, 60).min(area.width.saturating_sub(2));
  Rect::new(
    area.x + 1,
    area.y + 1,
    width,
    height.min(area.height.saturating_sub(2)),
  )
}

/// Centered overlay, clipped to `area`
pub(crate) fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width.saturating_sub(4));
  let height = height.min(area.height.saturating_sub(4));
  Rect::new(
    area.x + area.width.saturating_sub(width) / 2,
    area.y + area.height.saturating_sub(height) / 2,
    width,
    height,
  )
}
