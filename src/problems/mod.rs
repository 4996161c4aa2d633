//! The problem list: rows loaded from CSV and the filter/sort/paginate pipeline.

pub mod pipeline;
pub mod row;

pub use pipeline::{ProblemListState, SortField, PAGE_SIZE};
pub use row::{all_tags, ProblemRow, ProblemSource};
