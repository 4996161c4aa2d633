//! Entity trait and the key-construction rule shared by every component.

use serde::Serialize;

use super::key::QueryKey;

/// Trait for backend records that the cache keys by id.
///
/// The cache never looks inside an entity beyond its id; the key helpers below are
/// the only place key shapes are decided, so two views asking for the same data end
/// up on the same entry.
pub trait Cacheable: Clone + Send + Sync + 'static {
  /// Backend identifier (`_id`)
  fn cache_key(&self) -> String;

  /// Entity type name, the root segment of every key for this type (e.g. "decks")
  fn entity_type() -> &'static str;

  /// `[type]`
  fn all_key() -> QueryKey {
    QueryKey::new(Self::entity_type())
  }

  /// `[type, "list"]`: prefix of every list query for this type.
  fn lists_key() -> QueryKey {
    Self::all_key().segment("list")
  }

  /// `[type, "list", filters]`
  fn list_key<F: Serialize>(filters: &F) -> QueryKey {
    Self::lists_key().param(filters)
  }

  /// `[type, "detail", id]`
  fn detail_key(id: &str) -> QueryKey {
    Self::all_key().segment("detail").segment(id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[derive(Clone)]
  struct Note {
    id: String,
  }

  impl Cacheable for Note {
    fn cache_key(&self) -> String {
      self.id.clone()
    }

    fn entity_type() -> &'static str {
      "notes"
    }
  }

  #[test]
  fn test_key_shapes() {
    assert_eq!(Note::all_key().canonical(), r#"["notes"]"#);
    assert_eq!(Note::lists_key().canonical(), r#"["notes","list"]"#);
    assert_eq!(
      Note::list_key(&json!({"page": 2})).canonical(),
      r#"["notes","list",{"page":2}]"#
    );
    let note = Note { id: "n1".into() };
    assert_eq!(
      Note::detail_key(&note.cache_key()).canonical(),
      r#"["notes","detail","n1"]"#
    );
  }

  #[test]
  fn test_list_keys_share_prefix_but_not_details() {
    let list = Note::list_key(&json!({"search": "dp"}));
    assert!(list.starts_with(&Note::lists_key()));
    assert!(list.starts_with(&Note::all_key()));
    assert!(!Note::detail_key("n1").starts_with(&Note::lists_key()));
    assert!(Note::detail_key("n1").starts_with(&Note::all_key()));
  }
}
