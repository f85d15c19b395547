use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::ai::{RemoteError, Summarizer};
use crate::catalog::CatalogEntry;
use crate::constants::constants;

/// Shown when the service answered but the reply couldn't be parsed.
pub const FALLBACK_MALFORMED: &str = "Details retrieved from secure archives.";
/// Shown when the service couldn't be reached.
pub const FALLBACK_OFFLINE: &str = "Offline archives access only.";
/// Shown when the reply parsed but carried no description.
pub const FALLBACK_EMPTY: &str = "Description unavailable.";

/// Fetches short blurbs for catalog entries. Never fails: every error becomes a placeholder.
pub struct DetailFetcher<S> {
  summarizer: S,
}

impl<S: Summarizer> DetailFetcher<S> {
  pub fn new(summarizer: S) -> Self {
    Self { summarizer }
  }

  pub async fn describe(&self, entry: &CatalogEntry) -> String {
    match self.summarizer.summarize(&entry.display_name).await {
      Ok(Some(text)) => text,
      Ok(None) => {
        info!(game = %entry.display_name, "detail: empty description");
        FALLBACK_EMPTY.to_string()
      }
      Err(RemoteError::Malformed(e)) => {
        warn!(game = %entry.display_name, err = %e, "detail: unparseable description");
        FALLBACK_MALFORMED.to_string()
      }
      Err(RemoteError::Unavailable(e)) => {
        warn!(game = %entry.display_name, err = %e, "detail: description service unavailable");
        FALLBACK_OFFLINE.to_string()
      }
    }
  }

  /// Describe several entries with bounded concurrency. Results come back in input order.
  pub async fn describe_all(&self, entries: &[CatalogEntry]) -> Vec<(String, String)> {
    let mut described: Vec<(usize, String, String)> = stream::iter(entries.iter().enumerate())
      .map(|(idx, entry)| async move { (idx, entry.id.clone(), self.describe(entry).await) })
      .buffer_unordered(constants().describe_concurrency)
      .collect()
      .await;
    described.sort_by_key(|(idx, _, _)| *idx);
    described.into_iter().map(|(_, id, text)| (id, text)).collect()
  }
}
