use std::collections::HashSet;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

use crate::ai::SemanticMatcher;
use crate::catalog::CatalogEntry;

/// Outcome of one search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
  /// Matching entries in catalog order.
  pub entries: Vec<CatalogEntry>,
  /// `true` when the remote matcher produced the result, `false` for the local fallback.
  pub ok: bool,
  /// A newer search started while this one was waiting on the remote matcher.
  /// Stale results never replace the last result.
  pub stale: bool,
  /// Order in which the search started; `0` before the first search.
  pub generation: u64,
}

/// Case-insensitive substring match on display names, in catalog order.
pub fn local_match(query: &str, catalog: &[CatalogEntry]) -> Vec<CatalogEntry> {
  let needle = query.trim().to_lowercase();
  catalog.iter().filter(|e| e.display_name.to_lowercase().contains(&needle)).cloned().collect()
}

/// Entries whose display name appears exactly in `names`, in catalog order.
pub fn intersect(names: &[String], catalog: &[CatalogEntry]) -> Vec<CatalogEntry> {
  let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
  catalog.iter().filter(|e| wanted.contains(e.display_name.as_str())).cloned().collect()
}

/// Turns free text into a filtered list of catalog entries.
///
/// The remote matcher only decides membership; ordering always follows the catalog.
/// Any remote failure, or a reply naming nothing in the catalog, falls back to
/// [`local_match`]. Resolving never fails.
pub struct QueryResolver<M> {
  matcher: M,
  generation: AtomicU64,
  last: StdMutex<Resolution>,
}

impl<M: SemanticMatcher> QueryResolver<M> {
  pub fn new(matcher: M) -> Self {
    Self { matcher, generation: AtomicU64::new(0), last: StdMutex::new(Resolution::default()) }
  }

  /// The most recent non-stale result (empty before the first search).
  pub fn last(&self) -> Resolution {
    self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  pub async fn resolve(&self, query: &str, catalog: &[CatalogEntry]) -> Resolution {
    let query = query.trim();
    if query.is_empty() {
      return self.last();
    }

    let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let candidates: Vec<String> = catalog.iter().map(|e| e.display_name.clone()).collect();

    let remote = match self.matcher.match_names(query, &candidates).await {
      Ok(names) => {
        let entries = intersect(&names, catalog);
        info!(query = %query, returned = names.len(), matched = entries.len(), "search: remote matches");
        Some(entries).filter(|e| !e.is_empty())
      }
      Err(e) => {
        warn!(query = %query, err = %e, "search: remote match failed, using local match");
        None
      }
    };

    let resolution = match remote {
      Some(entries) => Resolution { entries, ok: true, stale: false, generation: ticket },
      None => {
        let entries = local_match(query, catalog);
        info!(query = %query, matched = entries.len(), "search: local match");
        Resolution { entries, ok: false, stale: false, generation: ticket }
      }
    };

    // Check and store under one lock so a newer result can't land in between.
    let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
    if self.generation.load(Ordering::SeqCst) != ticket {
      info!(query = %query, ticket, "search: discarding stale result");
      return Resolution { stale: true, ..resolution };
    }
    *last = resolution.clone();
    resolution
  }
}
