pub mod footer;
pub mod header;
pub mod utils;

pub use footer::{draw_footer, Notice};
pub use header::{draw_header, extract_host, HeaderInfo};
pub use utils::{difficulty_color, rating_color, truncate};
