use reqwest::Client;
use tracing::{info, warn};

use crate::ai::GeminiClient;
use crate::catalog::{Catalog, CatalogEntry};
use crate::config::Config;
use crate::detail::DetailFetcher;
use crate::launcher::{DisplaySurface, LaunchError, Launcher, ResourceOrigin};
use crate::resolver::{QueryResolver, Resolution};

/// The pipeline wired together: one catalog plus the three network-facing components.
pub struct App {
  pub catalog: Catalog,
  resolver: QueryResolver<GeminiClient>,
  details: DetailFetcher<GeminiClient>,
  launcher: Launcher,
}

impl App {
  pub fn new(catalog: Catalog, config: &Config) -> Self {
    let http = Client::new();
    let gemini = GeminiClient::from_config(http.clone(), config);
    let launcher = Launcher::new(http, ResourceOrigin::from_config(config));
    Self::with_parts(catalog, gemini, launcher)
  }

  pub fn with_parts(catalog: Catalog, gemini: GeminiClient, launcher: Launcher) -> Self {
    if !gemini.has_api_key() {
      warn!("no API key configured; search and descriptions will use offline fallbacks");
    }
    info!(games = catalog.len(), "catalog ready");
    Self {
      catalog,
      resolver: QueryResolver::new(gemini.clone()),
      details: DetailFetcher::new(gemini),
      launcher,
    }
  }

  pub async fn search(&self, query: &str) -> Resolution {
    self.resolver.resolve(query, self.catalog.entries()).await
  }

  /// Fetch a fresh blurb for `id` and store it on the entry. `None` for unknown ids.
  pub async fn open_detail(&mut self, id: &str) -> Option<&CatalogEntry> {
    let entry = self.catalog.get(id)?;
    let description = self.details.describe(entry).await;
    self.catalog.set_description(id, &description);
    self.catalog.get(id)
  }

  /// Blurbs for several entries at once, keyed by id.
  pub async fn describe_all(&self, entries: &[CatalogEntry]) -> Vec<(String, String)> {
    self.details.describe_all(entries).await
  }

  pub async fn launch<D: DisplaySurface>(&self, surface: D, entry: &CatalogEntry) -> Result<D, LaunchError> {
    self.launcher.launch_into(surface, entry).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detail::FALLBACK_OFFLINE;
  use crate::surface::FileSurface;
  use crate::testutil::{http_client, serve_once};
  use tempfile::TempDir;

  fn offline_app(origin: &str) -> App {
    let catalog = Catalog::from_filenames(&["clMazeRunner.html", "clCarRace.html", "clGhostHunt.html"]);
    let gemini = GeminiClient::new(http_client(), None, "test-model".into(), "http://127.0.0.1:9".into());
    let launcher = Launcher::new(http_client(), ResourceOrigin::Plain(origin.to_string()));
    App::with_parts(catalog, gemini, launcher)
  }

  #[tokio::test]
  async fn offline_search_uses_local_match() {
    let app = offline_app("https://cdn.test/");
    let res = app.search("maze").await;
    assert_eq!(res.entries.len(), 1);
    assert_eq!(res.entries[0].display_name, "Maze Runner");
    assert!(!res.ok);
  }

  #[tokio::test]
  async fn open_detail_stores_description() {
    let mut app = offline_app("https://cdn.test/");
    let entry = app.open_detail("clCarRace.html").await.unwrap();
    assert_eq!(entry.description, FALLBACK_OFFLINE);
    assert_eq!(app.catalog.get("clCarRace.html").unwrap().description, FALLBACK_OFFLINE);
    assert!(app.open_detail("nope.html").await.is_none());
  }

  #[tokio::test]
  async fn launch_writes_game_to_file_surface() {
    let (base, _recorded) = serve_once(200, "<html><head></head><body>maze</body></html>").await;
    let app = offline_app(&base);
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("maze.html");
    let entry = app.catalog.get("clMazeRunner.html").unwrap().clone();

    let surface = FileSurface::acquire(path.clone()).unwrap();
    app.launch(surface, &entry).await.unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, "<html><head><title>Maze Runner</title></head><body>maze</body></html>");
  }

  #[tokio::test]
  async fn failed_launch_removes_file_surface() {
    let (base, _recorded) = serve_once(404, "").await;
    let app = offline_app(&base);
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("maze.html");
    let entry = app.catalog.get("clMazeRunner.html").unwrap().clone();

    let surface = FileSurface::acquire(path.clone()).unwrap();
    assert!(path.exists());
    let err = app.launch(surface, &entry).await.unwrap_err();
    assert!(matches!(err, LaunchError::FetchFailed(_)));
    assert!(!path.exists());
  }
}
