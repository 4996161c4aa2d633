//! Filter → sort → paginate over the problem list.
//!
//! The pipeline itself is a pure function of the rows, the filter, the sort, and
//! the page. [`ProblemListState`] wraps it with the bookkeeping the list view needs:
//! any change to filter or sort returns to page 1, and the filtered and sorted order
//! is only recomputed when one of its inputs actually changed.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::row::ProblemRow;

pub const PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
  #[default]
  Id,
  Title,
  Rating,
}

impl SortField {
  pub fn label(self) -> &'static str {
    match self {
      Self::Id => "ID",
      Self::Title => "Title",
      Self::Rating => "Rating",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
  #[default]
  Ascending,
  Descending,
}

impl SortDirection {
  pub fn flipped(self) -> Self {
    match self {
      Self::Ascending => Self::Descending,
      Self::Descending => Self::Ascending,
    }
  }

  pub fn arrow(self) -> &'static str {
    match self {
      Self::Ascending => "▲",
      Self::Descending => "▼",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
  pub field: SortField,
  pub direction: SortDirection,
}

impl SortState {
  /// Same field flips direction; a new field starts ascending.
  pub fn toggle(&mut self, field: SortField) {
    if self.field == field {
      self.direction = self.direction.flipped();
    } else {
      self.field = field;
      self.direction = SortDirection::Ascending;
    }
  }

  /// Compare by the selected field; ties fall back to ID ascending in either direction.
  pub fn compare(&self, a: &ProblemRow, b: &ProblemRow) -> Ordering {
    let primary = match self.field {
      SortField::Id => a.id.cmp(&b.id),
      SortField::Title => compare_case_insensitive(&a.title, &b.title),
      SortField::Rating => a.rating.cmp(&b.rating),
    };
    let primary = match self.direction {
      SortDirection::Ascending => primary,
      SortDirection::Descending => primary.reverse(),
    };
    primary.then_with(|| a.id.cmp(&b.id))
  }
}

fn compare_case_insensitive(a: &str, b: &str) -> Ordering {
  a.chars()
    .flat_map(char::to_lowercase)
    .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Parse a rating bound as typed by the user. Empty (or unparsable) means unbounded.
pub fn parse_rating_bound(input: &str) -> Option<u32> {
  input.trim().parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemFilter {
  /// Case-insensitive substring of the title
  pub search: String,
  /// Row passes if it has any of these; empty passes everything
  pub tags: BTreeSet<String>,
  pub min_rating: Option<u32>,
  pub max_rating: Option<u32>,
}

impl ProblemFilter {
  pub fn matches(&self, row: &ProblemRow) -> bool {
    self.matches_search(row) && self.matches_tags(row) && self.matches_rating(row)
  }

  fn matches_search(&self, row: &ProblemRow) -> bool {
    let needle = self.search.trim();
    needle.is_empty() || row.title.to_lowercase().contains(&needle.to_lowercase())
  }

  fn matches_tags(&self, row: &ProblemRow) -> bool {
    self.tags.is_empty() || row.has_any_tag(&self.tags)
  }

  fn matches_rating(&self, row: &ProblemRow) -> bool {
    self.min_rating.map_or(true, |min| row.rating >= min)
      && self.max_rating.map_or(true, |max| row.rating <= max)
  }

  pub fn is_empty(&self) -> bool {
    self.search.trim().is_empty()
      && self.tags.is_empty()
      && self.min_rating.is_none()
      && self.max_rating.is_none()
  }
}

/// Indices of the rows passing `filter`, in `sort` order.
pub fn filter_and_sort(
  rows: &[ProblemRow],
  filter: &ProblemFilter,
  sort: SortState,
) -> Vec<usize> {
  let mut order: Vec<usize> = rows
    .iter()
    .enumerate()
    .filter(|(_, row)| filter.matches(row))
    .map(|(i, _)| i)
    .collect();
  order.sort_by(|&a, &b| sort.compare(&rows[a], &rows[b]));
  order
}

/// Number of pages for `len` items; an empty list still has one (empty) page.
pub fn total_pages(len: usize, page_size: usize) -> usize {
  len.div_ceil(page_size.max(1)).max(1)
}

/// The `page`-th (1-based) window of `items`. Out-of-range pages are empty.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
  let page_size = page_size.max(1);
  let start = page.saturating_sub(1).saturating_mul(page_size);
  if start >= items.len() {
    return &[];
  }
  let end = (start + page_size).min(items.len());
  &items[start..end]
}

/// What the list view renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemPage<'a> {
  pub rows: Vec<&'a ProblemRow>,
  pub page: usize,
  pub total_pages: usize,
  pub total_matches: usize,
}

/// Filter, sort, and page state of the problem list.
#[derive(Debug, Clone)]
pub struct ProblemListState {
  rows: Arc<Vec<ProblemRow>>,
  filter: ProblemFilter,
  sort: SortState,
  page: usize,
  page_size: usize,
  /// Filtered and sorted row indices; `None` when an input changed.
  order: Option<Vec<usize>>,
}

impl Default for ProblemListState {
  fn default() -> Self {
    Self::new(Arc::new(Vec::new()), PAGE_SIZE)
  }
}

impl ProblemListState {
  pub fn new(rows: Arc<Vec<ProblemRow>>, page_size: usize) -> Self {
    Self {
      rows,
      filter: ProblemFilter::default(),
      sort: SortState::default(),
      page: 1,
      page_size: page_size.max(1),
      order: None,
    }
  }

  pub fn rows(&self) -> &[ProblemRow] {
    &self.rows
  }

  pub fn filter(&self) -> &ProblemFilter {
    &self.filter
  }

  pub fn sort(&self) -> SortState {
    self.sort
  }

  /// Swap in a new collection. The same `Arc` is a no-op.
  pub fn set_rows(&mut self, rows: Arc<Vec<ProblemRow>>) {
    if Arc::ptr_eq(&self.rows, &rows) {
      return;
    }
    self.rows = rows;
    self.page = 1;
    self.order = None;
  }

  pub fn set_search(&mut self, search: &str) {
    if self.filter.search != search {
      self.filter.search = search.to_string();
      self.filter_changed();
    }
  }

  pub fn set_tags(&mut self, tags: BTreeSet<String>) {
    if self.filter.tags != tags {
      self.filter.tags = tags;
      self.filter_changed();
    }
  }

  /// Set the rating range from raw input; empty input clears that side.
  pub fn set_rating_range(&mut self, min: &str, max: &str) {
    let (min, max) = (parse_rating_bound(min), parse_rating_bound(max));
    if self.filter.min_rating != min || self.filter.max_rating != max {
      self.filter.min_rating = min;
      self.filter.max_rating = max;
      self.filter_changed();
    }
  }

  pub fn clear_filters(&mut self) {
    if !self.filter.is_empty() {
      self.filter = ProblemFilter::default();
      self.filter_changed();
    }
  }

  pub fn toggle_sort(&mut self, field: SortField) {
    self.sort.toggle(field);
    self.filter_changed();
  }

  fn filter_changed(&mut self) {
    self.order = None;
    self.page = 1;
  }

  fn order(&mut self) -> &[usize] {
    if self.order.is_none() {
      self.order = Some(filter_and_sort(&self.rows, &self.filter, self.sort));
    }
    self.order.as_deref().unwrap_or(&[])
  }

  pub fn total_matches(&mut self) -> usize {
    self.order().len()
  }

  pub fn total_pages(&mut self) -> usize {
    let page_size = self.page_size;
    total_pages(self.order().len(), page_size)
  }

  pub fn has_next(&mut self) -> bool {
    self.page < self.total_pages()
  }

  pub fn has_prev(&self) -> bool {
    self.page > 1
  }

  /// Go forward a page. Returns false at the last page.
  pub fn next_page(&mut self) -> bool {
    if !self.has_next() {
      return false;
    }
    self.page += 1;
    true
  }

  /// Go back a page. Returns false at page 1.
  pub fn prev_page(&mut self) -> bool {
    if !self.has_prev() {
      return false;
    }
    self.page -= 1;
    true
  }

  /// The current page of rows.
  pub fn current(&mut self) -> ProblemPage<'_> {
    let (page, page_size) = (self.page, self.page_size);
    let total_pages = self.total_pages();
    let total_matches = self.total_matches();
    let order = self.order.as_deref().unwrap_or(&[]);
    let rows = paginate(order, page, page_size)
      .iter()
      .map(|&i| &self.rows[i])
      .collect();
    ProblemPage {
      rows,
      page,
      total_pages,
      total_matches,
    }
  }
}
