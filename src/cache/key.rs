//! Hierarchical query keys.
//!
//! A key is an ordered list of JSON values, e.g. `["decks", "list", {"page": 1}]`.
//! Equality and prefix matching go through a canonical serialization with object
//! keys sorted, so two filter objects built in different field order are the same key.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::warn;

/// Ordered identifier tuple for one query.
#[derive(Debug, Clone)]
pub struct QueryKey {
  parts: Vec<Value>,
}

impl QueryKey {
  /// Start a key at its root segment (usually the entity type).
  pub fn new(root: impl Into<String>) -> Self {
    Self {
      parts: vec![Value::String(root.into())],
    }
  }

  /// Build a key out of plain string segments.
  pub fn from_segments(segments: &[&str]) -> Self {
    Self {
      parts: segments
        .iter()
        .map(|s| Value::String((*s).to_string()))
        .collect(),
    }
  }

  /// Append a string segment.
  pub fn segment(mut self, segment: impl Into<String>) -> Self {
    self.parts.push(Value::String(segment.into()));
    self
  }

  /// Append a structured segment such as a filter object.
  pub fn param<S: Serialize>(mut self, value: &S) -> Self {
    let value = match serde_json::to_value(value) {
      Ok(value) => value,
      Err(e) => {
        warn!(error = %e, "query key parameter is not representable as JSON");
        Value::Null
      }
    };
    self.parts.push(value);
    self
  }

  /// True if every segment of `prefix` equals the segment at the same position here.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    prefix.parts.len() <= self.parts.len()
      && prefix
        .parts
        .iter()
        .zip(&self.parts)
        .all(|(a, b)| canonical_value(a) == canonical_value(b))
  }

  /// Canonical JSON array representation.
  pub fn canonical(&self) -> String {
    let mut out = String::new();
    write_canonical(&Value::Array(self.parts.clone()), &mut out);
    out
  }

  /// SHA-256 of the canonical form, used as the storage key.
  pub fn hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.canonical().as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl PartialEq for QueryKey {
  fn eq(&self, other: &Self) -> bool {
    self.canonical() == other.canonical()
  }
}

impl Eq for QueryKey {}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.canonical())
  }
}

fn canonical_value(value: &Value) -> String {
  let mut out = String::new();
  write_canonical(value, &mut out);
  out
}

fn write_canonical(value: &Value, out: &mut String) {
  match value {
    Value::Object(map) => {
      let mut fields: Vec<(&String, &Value)> = map.iter().collect();
      fields.sort_by(|a, b| a.0.cmp(b.0));
      out.push('{');
      for (i, (name, field)) in fields.into_iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        out.push_str(&Value::String(name.clone()).to_string());
        out.push(':');
        write_canonical(field, out);
      }
      out.push('}');
    }
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        write_canonical(item, out);
      }
      out.push(']');
    }
    scalar => out.push_str(&scalar.to_string()),
  }
}
