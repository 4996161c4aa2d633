//! Problem rows and CSV loading.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::PathBuf;

/// Sample list shipped with the binary, used when no CSV is configured.
const EMBEDDED_PROBLEMS: &str = include_str!("../../assets/problems.csv");

/// One row of the problem list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemRow {
  pub id: u32,
  pub title: String,
  pub rating: u32,
  /// In source order; filters treat them as a set
  pub tags: Vec<String>,
}

impl ProblemRow {
  pub fn has_any_tag(&self, tags: &BTreeSet<String>) -> bool {
    self.tags.iter().any(|tag| tags.contains(tag))
  }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
  #[serde(rename = "ID")]
  id: u32,
  #[serde(rename = "Title")]
  title: String,
  #[serde(rename = "Rating")]
  rating: u32,
  #[serde(rename = "Tags", default)]
  tags: String,
}

impl From<CsvRow> for ProblemRow {
  fn from(row: CsvRow) -> Self {
    let tags = row
      .tags
      .split(';')
      .map(str::trim)
      .filter(|tag| !tag.is_empty())
      .map(String::from)
      .collect();
    Self {
      id: row.id,
      title: row.title.trim().to_string(),
      rating: row.rating,
      tags,
    }
  }
}

/// Parse `ID,Title,Rating,Tags` CSV. Any malformed row fails the whole parse.
pub fn parse_problems<R: Read>(reader: R) -> Result<Vec<ProblemRow>> {
  let mut csv = csv::ReaderBuilder::new()
    .trim(csv::Trim::Headers)
    .from_reader(reader);

  csv
    .deserialize::<CsvRow>()
    .enumerate()
    .map(|(i, row)| {
      row
        .map(ProblemRow::from)
        // Header is line 1
        .map_err(|e| eyre!("Invalid problem on line {}: {}", i + 2, e))
    })
    .collect()
}

/// Where the problem list comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProblemSource {
  #[default]
  Embedded,
  File(PathBuf),
}

impl ProblemSource {
  pub fn from_path(path: Option<PathBuf>) -> Self {
    path.map(Self::File).unwrap_or_default()
  }

  pub fn load(&self) -> Result<Vec<ProblemRow>> {
    match self {
      Self::Embedded => parse_problems(EMBEDDED_PROBLEMS.as_bytes()),
      Self::File(path) => {
        let file = std::fs::File::open(path)
          .map_err(|e| eyre!("Failed to open problems file {}: {}", path.display(), e))?;
        parse_problems(file)
          .map_err(|e| eyre!("Failed to parse problems file {}: {}", path.display(), e))
      }
    }
  }

  /// Short label for the header
  pub fn label(&self) -> String {
    match self {
      Self::Embedded => "sample".to_string(),
      Self::File(path) => path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string()),
    }
  }
}

/// Every distinct tag in `rows`, sorted.
pub fn all_tags(rows: &[ProblemRow]) -> Vec<String> {
  rows
    .iter()
    .flat_map(|row| row.tags.iter().cloned())
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_splits_tags() {
    let csv = "ID,Title,Rating,Tags\n1,two-sum,1200,array; hash table\n2,add-two,1500,\n";
    let rows = parse_problems(csv.as_bytes()).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].tags, vec!["array", "hash table"]);
    assert!(rows[1].tags.is_empty());
  }

  #[test]
  fn test_parse_quoted_title() {
    let csv = "ID,Title,Rating,Tags\n208,\"Implement Trie, Prefix Tree\",1600,Trie\n";
    let rows = parse_problems(csv.as_bytes()).unwrap();
    assert_eq!(rows[0].title, "Implement Trie, Prefix Tree");
  }

  #[test]
  fn test_parse_fails_on_bad_row() {
    let csv = "ID,Title,Rating,Tags\n1,two-sum,1200,array\nx,broken,high,\n";
    let err = parse_problems(csv.as_bytes()).unwrap_err();
    assert!(err.to_string().contains("line 3"));
  }

  #[test]
  fn test_embedded_sample_loads() {
    let rows = ProblemSource::Embedded.load().unwrap();
    assert!(rows.len() > 20);
    let ids: BTreeSet<u32> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), rows.len(), "ids are unique");
  }

  #[test]
  fn test_missing_file_is_an_error() {
    let source = ProblemSource::from_path(Some(PathBuf::from("/nonexistent/problems.csv")));
    assert!(source.load().is_err());
    assert_eq!(source.label(), "problems.csv");
  }

  #[test]
  fn test_all_tags_sorted_and_distinct() {
    let rows = vec![
      ProblemRow {
        id: 1,
        title: "two-sum".into(),
        rating: 1200,
        tags: vec!["array".into()],
      },
      ProblemRow {
        id: 3,
        title: "sum-root".into(),
        rating: 1300,
        tags: vec!["tree".into(), "array".into()],
      },
    ];
    assert_eq!(all_tags(&rows), vec!["array", "tree"]);
  }
}
