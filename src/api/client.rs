use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use super::types::{
  Deck, DeckUpdate, Flashcard, FlashcardUpdate, ListFilters, NewDeck, NewFlashcard, Paginated,
  ProblemCompletion, ProblemsCompleted,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("devdecks/", env!("CARGO_PKG_VERSION"));

/// DevDecks REST API client
///
/// Every request updates the connectivity flag: a connection failure marks the
/// client offline, any HTTP response marks it online again.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
  online: Arc<watch::Sender<bool>>,
}

impl ApiClient {
  pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
    let base = parse_base_url(base_url)?;

    let http = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .user_agent(USER_AGENT)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let (online, _) = watch::channel(true);

    Ok(Self {
      http,
      base,
      token: token.filter(|t| !t.is_empty()),
      online: Arc::new(online),
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// Receiver that changes whenever connectivity flips.
  pub fn connectivity(&self) -> watch::Receiver<bool> {
    self.online.subscribe()
  }

  // --------------------------------------------------------------------------
  // Decks
  // --------------------------------------------------------------------------

  pub async fn list_decks(&self, filters: &ListFilters) -> Result<Paginated<Deck>> {
    let req = self.request(Method::GET, &["decks"])?.query(filters);
    self.send(req, "list decks").await
  }

  pub async fn get_deck(&self, id: &str) -> Result<Deck> {
    let req = self.request(Method::GET, &["decks", id])?;
    self.send(req, &format!("get deck {}", id)).await
  }

  pub async fn create_deck(&self, deck: &NewDeck) -> Result<Deck> {
    let req = self.request(Method::POST, &["decks"])?.json(deck);
    self.send(req, "create deck").await
  }

  pub async fn update_deck(&self, id: &str, update: &DeckUpdate) -> Result<Deck> {
    let req = self.request(Method::PUT, &["decks", id])?.json(update);
    self.send(req, &format!("update deck {}", id)).await
  }

  pub async fn delete_deck(&self, id: &str) -> Result<()> {
    let req = self.request(Method::DELETE, &["decks", id])?;
    self.send_empty(req, &format!("delete deck {}", id)).await
  }

  // --------------------------------------------------------------------------
  // Flashcards
  // --------------------------------------------------------------------------

  pub async fn list_flashcards(&self, filters: &ListFilters) -> Result<Paginated<Flashcard>> {
    let req = self.request(Method::GET, &["flashcards"])?.query(filters);
    self.send(req, "list flashcards").await
  }

  pub async fn get_flashcard(&self, id: &str) -> Result<Flashcard> {
    let req = self.request(Method::GET, &["flashcards", id])?;
    self.send(req, &format!("get flashcard {}", id)).await
  }

  pub async fn create_flashcard(&self, card: &NewFlashcard) -> Result<Flashcard> {
    let req = self.request(Method::POST, &["flashcards"])?.json(card);
    self.send(req, "create flashcard").await
  }

  pub async fn update_flashcard(&self, id: &str, update: &FlashcardUpdate) -> Result<Flashcard> {
    let req = self
      .request(Method::PUT, &["flashcards", id])?
      .json(update);
    self.send(req, &format!("update flashcard {}", id)).await
  }

  pub async fn delete_flashcard(&self, id: &str) -> Result<()> {
    let req = self.request(Method::DELETE, &["flashcards", id])?;
    self.send_empty(req, &format!("delete flashcard {}", id)).await
  }

  // --------------------------------------------------------------------------
  // Users
  // --------------------------------------------------------------------------

  /// Mark a problem completed (or not) for the authenticated user.
  pub async fn set_problem_completed(
    &self,
    problem_id: u32,
    completed: bool,
  ) -> Result<ProblemsCompleted> {
    let body = ProblemCompletion {
      problem_id,
      completed,
    };
    let req = self
      .request(Method::POST, &["users", "problems-completed"])?
      .json(&body);
    self.send(req, "update completed problems").await
  }

  // --------------------------------------------------------------------------
  // Plumbing
  // --------------------------------------------------------------------------

  /// URL of `segments` below the base path. Segments are percent-encoded, so an id
  /// containing `/` or `?` stays one segment.
  fn endpoint(&self, segments: &[&str]) -> Result<Url> {
    if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
      return Err(eyre!("Invalid API path segment {:?}", bad));
    }
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| eyre!("Invalid API URL {}: cannot hold a path", self.base))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
    let url = self.endpoint(segments)?;
    let req = self
      .http
      .request(method, url)
      .header(reqwest::header::ACCEPT, "application/json");
    Ok(match &self.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    })
  }

  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
    let response = self.execute(req, what).await?;
    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse response to {}: {}", what, e))
  }

  async fn send_empty(&self, req: RequestBuilder, what: &str) -> Result<()> {
    self.execute(req, what).await?;
    Ok(())
  }

  async fn execute(&self, req: RequestBuilder, what: &str) -> Result<reqwest::Response> {
    debug!(operation = what, "api request");
    let response = match req.send().await {
      Ok(response) => response,
      Err(e) => {
        if e.is_connect() || e.is_timeout() {
          self.set_online(false);
        }
        return Err(eyre!("Failed to {}: {}", what, e));
      }
    };
    self.set_online(true);

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let detail = error_message(response).await;
    Err(match status {
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => eyre!(
        "Failed to {}: {} (check DEVDECKS_API_TOKEN){}",
        what,
        status,
        detail
      ),
      _ => eyre!("Failed to {}: {}{}", what, status, detail),
    })
  }

  fn set_online(&self, online: bool) {
    let changed = self.online.send_if_modified(|current| {
      let changed = *current != online;
      *current = online;
      changed
    });
    if changed {
      if online {
        info!(base = %self.base, "api reachable again");
      } else {
        warn!(base = %self.base, "api unreachable");
      }
    }
  }
}

/// Pull `message` out of a JSON error body, if there is one.
async fn error_message(response: reqwest::Response) -> String {
  #[derive(serde::Deserialize)]
  struct ErrorBody {
    message: String,
  }

  match response.json::<ErrorBody>().await {
    Ok(body) if !body.message.is_empty() => format!(" ({})", body.message),
    _ => String::new(),
  }
}

/// Parse the base URL so that relative endpoint paths join beneath it.
fn parse_base_url(base_url: &str) -> Result<Url> {
  let trimmed = base_url.trim();
  let with_slash = if trimmed.ends_with('/') {
    trimmed.to_string()
  } else {
    format!("{}/", trimmed)
  };
  let url = Url::parse(&with_slash).map_err(|e| eyre!("Invalid API URL {}: {}", base_url, e))?;
  if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
    return Err(eyre!("Invalid API URL {}: expected http(s)", base_url));
  }
  Ok(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_base_url_joins_below_path() {
    let client = ApiClient::new("https://api.devdecks.dev/api", None).unwrap();
    assert_eq!(
      client.endpoint(&["decks", "abc"]).unwrap().as_str(),
      "https://api.devdecks.dev/api/decks/abc"
    );

    let client = ApiClient::new("http://localhost:5000/api/", None).unwrap();
    assert_eq!(
      client.endpoint(&["users", "problems-completed"]).unwrap().as_str(),
      "http://localhost:5000/api/users/problems-completed"
    );

    let client = ApiClient::new("http://localhost:5000", None).unwrap();
    assert_eq!(
      client.endpoint(&["decks"]).unwrap().as_str(),
      "http://localhost:5000/decks"
    );
  }

  #[test]
  fn test_ids_are_encoded_as_one_segment() {
    let client = ApiClient::new("http://localhost:5000/api", None).unwrap();
    assert_eq!(
      client.endpoint(&["decks", "a/b?c#d"]).unwrap().as_str(),
      "http://localhost:5000/api/decks/a%2Fb%3Fc%23d"
    );
    assert_eq!(
      client.endpoint(&["flashcards", "50%"]).unwrap().as_str(),
      "http://localhost:5000/api/flashcards/50%25"
    );
  }

  #[test]
  fn test_dot_and_empty_ids_are_rejected() {
    let client = ApiClient::new("http://localhost:5000/api", None).unwrap();
    assert!(client.endpoint(&["decks", ".."]).is_err());
    assert!(client.endpoint(&["decks", "."]).is_err());
    assert!(client.endpoint(&["decks", ""]).is_err());
  }

  #[test]
  fn test_rejects_non_http_urls() {
    assert!(ApiClient::new("not a url", None).is_err());
    assert!(ApiClient::new("ftp://example.com", None).is_err());
  }

  #[test]
  fn test_empty_token_is_ignored() {
    let client = ApiClient::new("http://localhost:5000", Some(String::new())).unwrap();
    assert!(client.token.is_none());
  }

  #[tokio::test]
  async fn test_connection_failure_marks_offline() {
    // Nothing listens on the discard port
    let client = ApiClient::new("http://127.0.0.1:9", None).unwrap();
    let mut connectivity = client.connectivity();
    assert!(*connectivity.borrow());

    let result = client.list_decks(&ListFilters::default()).await;
    assert!(result.is_err());
    assert!(connectivity.has_changed().unwrap());
    assert!(!*connectivity.borrow_and_update());
  }
}
