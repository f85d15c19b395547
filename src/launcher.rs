use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use reqwest::Client;
use tracing::{error, info};

use crate::catalog::CatalogEntry;
use crate::config::Config;
use crate::constants::constants;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
  #[error("game origin unavailable: {0}")]
  OriginUnavailable(String),

  #[error("failed to load game data: {0}")]
  FetchFailed(String),

  #[error("display surface error: {0}")]
  Surface(#[from] std::io::Error),
}

/// Somewhere a fetched game document can be shown.
///
/// Acquire it *before* calling [`Launcher::launch_into`]; on failure the launcher closes it.
pub trait DisplaySurface {
  fn show(&mut self, title: &str, content: &str) -> std::io::Result<()>;
  fn close(self);
}

/// Base location of playable documents. The embedded default is base64 at rest,
/// which is obfuscation only; a plain URL from the config replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceOrigin {
  Plain(String),
  Encoded(String),
}

impl ResourceOrigin {
  pub fn from_config(config: &Config) -> Self {
    match config.origin.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
      Some(origin) => ResourceOrigin::Plain(origin.to_string()),
      None => ResourceOrigin::Encoded(constants().encoded_origin.clone()),
    }
  }

  pub fn base(&self) -> Result<String, LaunchError> {
    match self {
      ResourceOrigin::Plain(base) => check_base(base.trim().to_string()),
      ResourceOrigin::Encoded(encoded) => decode_origin(encoded),
    }
  }
}

fn check_base(base: String) -> Result<String, LaunchError> {
  if base.starts_with("http://") || base.starts_with("https://") {
    Ok(base)
  } else {
    Err(LaunchError::OriginUnavailable(format!("not an http(s) URL: {base:?}")))
  }
}

pub fn decode_origin(encoded: &str) -> Result<String, LaunchError> {
  let bytes =
    BASE64.decode(encoded.trim()).map_err(|e| LaunchError::OriginUnavailable(format!("undecodable origin: {e}")))?;
  let base = String::from_utf8(bytes).map_err(|_| LaunchError::OriginUnavailable("origin is not UTF-8".to_string()))?;
  check_base(base)
}

/// `<base>/<filename>.html?t=<millis>`. The extension is only added when missing.
pub fn resource_url(base: &str, filename: &str, timestamp_millis: i64) -> String {
  let ext = constants().resource_extension.as_str();
  let base = base.trim_end_matches('/');
  let filename = filename.trim_start_matches('/');
  let suffix = if filename.ends_with(ext) { "" } else { ext };
  format!("{base}/{filename}{suffix}?t={timestamp_millis}")
}

/// Fetches playable game documents from the resource origin.
pub struct Launcher {
  http: Client,
  origin: ResourceOrigin,
}

impl Launcher {
  pub fn new(http: Client, origin: ResourceOrigin) -> Self {
    Self { http, origin }
  }

  pub fn resolve_url(&self, entry: &CatalogEntry) -> Result<String, LaunchError> {
    let base = self.origin.base()?;
    Ok(resource_url(&base, &entry.filename, Utc::now().timestamp_millis()))
  }

  /// Fetch the whole document for `entry`. Non-success statuses are errors; no partial content.
  pub async fn launch(&self, entry: &CatalogEntry) -> Result<String, LaunchError> {
    let url = self.resolve_url(entry)?;
    info!(game = %entry.display_name, url = %url, "launch: fetching game data");

    let resp = self.http.get(&url).send().await.map_err(|e| LaunchError::FetchFailed(format!("request failed: {e}")))?;
    let status = resp.status();
    if !status.is_success() {
      return Err(LaunchError::FetchFailed(format!("http {status}")));
    }
    let content =
      resp.text().await.map_err(|e| LaunchError::FetchFailed(format!("reading game data failed: {e}")))?;
    info!(game = %entry.display_name, bytes = content.len(), "launch: game data loaded");
    Ok(content)
  }

  /// Fetch `entry` and show it on an already-acquired surface. The surface is
  /// handed back on success and closed on any failure.
  pub async fn launch_into<D: DisplaySurface>(&self, mut surface: D, entry: &CatalogEntry) -> Result<D, LaunchError> {
    let shown = match self.launch(entry).await {
      Ok(content) => surface.show(&entry.display_name, &content).map_err(LaunchError::from),
      Err(e) => Err(e),
    };
    match shown {
      Ok(()) => Ok(surface),
      Err(e) => {
        error!(game = %entry.display_name, err = %e, "launch: failed, closing surface");
        surface.close();
        Err(e)
      }
    }
  }
}
