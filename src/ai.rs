use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::constants;

/// Failure talking to the generative service. Callers absorb both kinds into a degraded result.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
  #[error("remote service unavailable: {0}")]
  Unavailable(String),

  #[error("remote service returned malformed output: {0}")]
  Malformed(String),
}

/// Picks catalog names that match a free-text query.
pub trait SemanticMatcher {
  /// Returns the names the service considers relevant. Order carries no meaning.
  fn match_names(
    &self,
    query: &str,
    candidates: &[String],
  ) -> impl Future<Output = Result<Vec<String>, RemoteError>> + Send;
}

/// Writes a short blurb about a named subject.
pub trait Summarizer {
  /// `Ok(None)` when the reply had the right shape but no text.
  fn summarize(&self, subject: &str) -> impl Future<Output = Result<Option<String>, RemoteError>> + Send;
}

// --- Gemini ---

/// Client for the Gemini `generateContent` endpoint with JSON-schema constrained output.
#[derive(Debug, Clone)]
pub struct GeminiClient {
  http: Client,
  api_key: Option<String>,
  model: String,
  base_url: String,
}

impl GeminiClient {
  pub fn new(http: Client, api_key: Option<String>, model: String, base_url: String) -> Self {
    Self { http, api_key, model, base_url }
  }

  pub fn from_config(http: Client, config: &Config) -> Self {
    Self::new(http, config.api_key(), config.model(), config.api_base_url())
  }

  pub fn has_api_key(&self) -> bool {
    self.api_key.is_some()
  }

  fn endpoint(&self) -> String {
    let base = self.base_url.trim().trim_end_matches('/');
    let base =
      if base.ends_with("/v1beta") || base.ends_with("/v1") { base.to_string() } else { format!("{base}/v1beta") };
    format!("{}/models/{}:generateContent", base, self.model.trim())
  }

  /// One request/response exchange. Returns the concatenated text of the first candidate.
  async fn generate(&self, prompt: &str, schema: Value) -> Result<String, RemoteError> {
    let Some(api_key) = self.api_key.as_deref() else {
      return Err(RemoteError::Unavailable("no API key configured".to_string()));
    };

    let body = json!({
      "contents": [
        { "role": "user", "parts": [ { "text": prompt } ] }
      ],
      "generationConfig": {
        "responseMimeType": "application/json",
        "responseSchema": schema
      }
    });

    let resp = self
      .http
      .post(self.endpoint())
      .header("x-goog-api-key", api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| RemoteError::Unavailable(format!("request failed: {e}")))?;
    let status = resp.status();
    let text = resp.text().await.map_err(|e| RemoteError::Unavailable(format!("reading response failed: {e}")))?;
    if !status.is_success() {
      return Err(RemoteError::Unavailable(format!("http {status}: {}", excerpt(&text))));
    }
    response_text(&text)
  }
}

impl SemanticMatcher for GeminiClient {
  async fn match_names(&self, query: &str, candidates: &[String]) -> Result<Vec<String>, RemoteError> {
    debug!(model = %self.model, candidates = candidates.len(), "ai: requesting matches");
    let text = self.generate(&match_prompt(query, candidates), match_schema()).await?;
    let names = parse_matches(&text)?;
    debug!(returned = names.len(), "ai: matches received");
    Ok(names)
  }
}

impl Summarizer for GeminiClient {
  async fn summarize(&self, subject: &str) -> Result<Option<String>, RemoteError> {
    debug!(model = %self.model, subject = %subject, "ai: requesting summary");
    let text = self.generate(&summary_prompt(subject), summary_schema()).await?;
    parse_description(&text)
  }
}

// --- Prompts and schemas ---

fn match_prompt(query: &str, candidates: &[String]) -> String {
  let c = constants();
  format!(
    "Here is a list of browser games: [{}].\n\
     A player is searching for: \"{}\".\n\n\
     Work out what they want (a genre, a mood, or a specific title) and pick the {}-{} games from the list \
     that fit best. Read intent loosely: \"scary\" means horror games, \"racing\" means driving games.\n\
     Reply with a JSON object whose \"matches\" property is an array of game names copied exactly from the list.",
    candidates.join(", "),
    query,
    c.match_min,
    c.match_max,
  )
}

fn summary_prompt(subject: &str) -> String {
  let c = constants();
  format!(
    "Summarise the game \"{}\" for a catalog card.\n\
     At most {} words and {} sentences. Say only what the player does.\n\
     Reply with a JSON object with a single string property \"description\".",
    subject, c.summary_max_words, c.summary_max_sentences,
  )
}

fn match_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "matches": { "type": "ARRAY", "items": { "type": "STRING" } }
    },
    "required": ["matches"]
  })
}

fn summary_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "description": { "type": "STRING" }
    },
    "required": ["description"]
  })
}

// --- Response parsing ---

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
  text: Option<String>,
}

#[derive(Deserialize)]
struct MatchesPayload {
  #[serde(default)]
  matches: Vec<String>,
}

fn excerpt(text: &str) -> &str {
  match text.char_indices().nth(200) {
    Some((idx, _)) => &text[..idx],
    None => text,
  }
}

/// Pull the generated text out of a `generateContent` response envelope.
fn response_text(body: &str) -> Result<String, RemoteError> {
  let resp: GenerateResponse = serde_json::from_str(body)
    .map_err(|e| RemoteError::Malformed(format!("response envelope: {e}. Response: {}", excerpt(body))))?;
  let text: String = resp
    .candidates
    .into_iter()
    .next()
    .and_then(|c| c.content)
    .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
    .unwrap_or_default();
  if text.trim().is_empty() {
    warn!("ai: response carried no text");
    return Err(RemoteError::Malformed("response missing text".to_string()));
  }
  Ok(text)
}

/// Models occasionally wrap JSON output in a markdown code fence.
fn strip_code_fence(text: &str) -> &str {
  let t = text.trim();
  let Some(rest) = t.strip_prefix("```") else { return t };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_payload(text: &str, what: &str) -> Result<Value, RemoteError> {
  serde_json::from_str(strip_code_fence(text))
    .map_err(|e| RemoteError::Malformed(format!("{what} payload: {e}. Response: {}", excerpt(text))))
}

/// Only a JSON object counts; a derived `Deserialize` would also take the struct written as an array.
fn parse_matches(text: &str) -> Result<Vec<String>, RemoteError> {
  let value = parse_payload(text, "matches")?;
  if !value.is_object() {
    return Err(RemoteError::Malformed(format!("matches payload is not an object: {}", excerpt(text))));
  }
  serde_json::from_value::<MatchesPayload>(value)
    .map(|p| p.matches)
    .map_err(|e| RemoteError::Malformed(format!("matches payload: {e}")))
}

/// Any valid JSON other than `null` is a reply; only an object with a non-blank
/// string `description` carries text.
fn parse_description(text: &str) -> Result<Option<String>, RemoteError> {
  match parse_payload(text, "description")? {
    Value::Null => Err(RemoteError::Malformed("description payload is null".to_string())),
    Value::Object(fields) => Ok(
      fields.get("description").and_then(Value::as_str).filter(|d| !d.trim().is_empty()).map(str::to_string),
    ),
    _ => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::{closed_port_url, http_client, serve_once};

  fn envelope(text: &str) -> String {
    json!({ "candidates": [ { "content": { "parts": [ { "text": text } ] } } ] }).to_string()
  }

  fn client(base_url: &str, api_key: Option<&str>) -> GeminiClient {
    GeminiClient::new(http_client(), api_key.map(str::to_string), "test-model".to_string(), base_url.to_string())
  }

  // --- parsing ---

  #[test]
  fn parse_matches_reads_names() {
    let names = parse_matches(r#"{"matches":["Ghost Hunt","Car Race"]}"#).unwrap();
    assert_eq!(names, vec!["Ghost Hunt", "Car Race"]);
  }

  #[test]
  fn parse_matches_missing_field_is_empty() {
    assert!(parse_matches("{}").unwrap().is_empty());
  }

  #[test]
  fn parse_matches_rejects_wrong_shape() {
    assert!(matches!(parse_matches(r#"["Ghost Hunt"]"#), Err(RemoteError::Malformed(_))));
    assert!(matches!(parse_matches(r#"{"matches":"Ghost Hunt"}"#), Err(RemoteError::Malformed(_))));
    assert!(matches!(parse_matches("not json"), Err(RemoteError::Malformed(_))));
  }

  #[test]
  fn parse_matches_accepts_code_fence() {
    let names = parse_matches("```json\n{\"matches\":[\"Snake\"]}\n```").unwrap();
    assert_eq!(names, vec!["Snake"]);
  }

  #[test]
  fn parse_description_variants() {
    assert_eq!(parse_description(r#"{"description":"Dodge ghosts."}"#).unwrap().as_deref(), Some("Dodge ghosts."));
    assert_eq!(parse_description("{}").unwrap(), None);
    assert_eq!(parse_description(r#"{"description":"  "}"#).unwrap(), None);
    assert!(matches!(parse_description("Dodge ghosts."), Err(RemoteError::Malformed(_))));
    assert!(matches!(parse_description(r#"{"description":5}"#), Ok(None)));
  }

  #[test]
  fn array_payloads_are_not_objects() {
    assert!(matches!(parse_matches(r#"[["Ghost Hunt"]]"#), Err(RemoteError::Malformed(_))));
    assert!(matches!(parse_matches("[]"), Err(RemoteError::Malformed(_))));
    assert!(matches!(parse_matches("42"), Err(RemoteError::Malformed(_))));
    assert_eq!(parse_description(r#"["Run the maze."]"#).unwrap(), None);
    assert_eq!(parse_description("[]").unwrap(), None);
  }

  #[test]
  fn non_object_descriptions_are_empty_unless_null() {
    assert_eq!(parse_description(r#""just a string""#).unwrap(), None);
    assert_eq!(parse_description("42").unwrap(), None);
    assert!(matches!(parse_description("null"), Err(RemoteError::Malformed(_))));
  }

  #[test]
  fn response_text_joins_parts_of_first_candidate() {
    let body = json!({
      "candidates": [
        { "content": { "parts": [ { "text": "{\"matches\":" }, { "text": "[]}" } ] } },
        { "content": { "parts": [ { "text": "ignored" } ] } }
      ]
    })
    .to_string();
    assert_eq!(response_text(&body).unwrap(), "{\"matches\":[]}");
  }

  #[test]
  fn response_text_without_candidates_is_malformed() {
    assert!(matches!(response_text(r#"{"candidates":[]}"#), Err(RemoteError::Malformed(_))));
    assert!(matches!(response_text("<html>"), Err(RemoteError::Malformed(_))));
  }

  #[test]
  fn endpoint_normalizes_version_suffix() {
    assert_eq!(
      client("https://api.test/", None).endpoint(),
      "https://api.test/v1beta/models/test-model:generateContent"
    );
    assert_eq!(client("https://api.test/v1", None).endpoint(), "https://api.test/v1/models/test-model:generateContent");
  }

  #[test]
  fn match_prompt_lists_candidates_and_query() {
    let prompt = match_prompt("scary", &["Ghost Hunt".to_string(), "Car Race".to_string()]);
    assert!(prompt.contains("[Ghost Hunt, Car Race]"));
    assert!(prompt.contains("\"scary\""));
    assert!(prompt.contains("15-20"));
  }

  // --- transport ---

  #[tokio::test]
  async fn missing_api_key_fails_without_request() {
    let gemini = client("http://127.0.0.1:9", None);
    assert!(!gemini.has_api_key());
    let err = gemini.match_names("maze", &["Maze Runner".to_string()]).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)));
    assert!(matches!(gemini.summarize("Maze Runner").await, Err(RemoteError::Unavailable(_))));
  }

  #[tokio::test]
  async fn match_names_round_trip() {
    let (base, recorded) = serve_once(200, &envelope(r#"{"matches":["Ghost Hunt"]}"#)).await;
    let gemini = client(&base, Some("secret"));
    let names = gemini.match_names("spooky", &["Car Race".to_string(), "Ghost Hunt".to_string()]).await.unwrap();
    assert_eq!(names, vec!["Ghost Hunt"]);

    let req = recorded.await.unwrap();
    assert_eq!(req.request_line, "POST /v1beta/models/test-model:generateContent HTTP/1.1");
    assert!(req.head.to_lowercase().contains("x-goog-api-key: secret"));
    let sent: Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(sent["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(sent["generationConfig"]["responseSchema"]["properties"]["matches"]["type"], "ARRAY");
    let prompt = sent["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Ghost Hunt") && prompt.contains("spooky"));
  }

  #[tokio::test]
  async fn summarize_round_trip() {
    let (base, _recorded) = serve_once(200, &envelope(r#"{"description":"Run the maze."}"#)).await;
    let text = client(&base, Some("k")).summarize("Maze Runner").await.unwrap();
    assert_eq!(text.as_deref(), Some("Run the maze."));
  }

  #[tokio::test]
  async fn error_status_is_unavailable() {
    let (base, _recorded) = serve_once(500, "boom").await;
    let err = client(&base, Some("k")).match_names("x", &[]).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(msg) if msg.contains("500")));
  }

  #[tokio::test]
  async fn unreachable_service_is_unavailable() {
    let base = closed_port_url().await;
    let err = client(&base, Some("k")).summarize("Snake").await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)));
  }

  #[tokio::test]
  async fn non_json_text_is_malformed() {
    let (base, _recorded) = serve_once(200, &envelope("Sure! Here are some games.")).await;
    let err = client(&base, Some("k")).match_names("x", &[]).await.unwrap_err();
    assert!(matches!(err, RemoteError::Malformed(_)));
  }
}
