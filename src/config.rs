use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::constants;

/// Environment variable holding the generative API credential.
pub const API_KEY_ENV: &str = "API_KEY";

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub api_key: Option<String>,
  pub model: Option<String>,
  pub api_base_url: Option<String>,
  /// Plain base URL of the resource origin. Overrides the embedded encoded origin.
  pub origin: Option<String>,
}

fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "gamestash")
}

/// Directory the log file is written to.
pub fn data_dir() -> Option<PathBuf> {
  project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = project_dirs() {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file)
        && let Ok(config) = toml::from_str(&content)
      {
        return config;
      }
    }
    Self::default()
  }

  pub fn save(&self) -> Result<PathBuf> {
    let proj_dirs = project_dirs().context("No home directory to store preferences in")?;
    let config_dir = proj_dirs.config_dir();
    std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    let config_file = config_dir.join("prefs.toml");
    let content = toml::to_string(self).context("Failed to serialize preferences")?;
    std::fs::write(&config_file, content).context("Failed to write preferences")?;
    Ok(config_file)
  }

  /// The API credential: environment first, then the config file. Blank values count as absent.
  pub fn api_key(&self) -> Option<String> {
    Self::pick_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.clone())
  }

  fn pick_api_key(env: Option<String>, file: Option<String>) -> Option<String> {
    env.into_iter().chain(file).map(|k| k.trim().to_string()).find(|k| !k.is_empty())
  }

  pub fn model(&self) -> String {
    self.model.clone().filter(|m| !m.trim().is_empty()).unwrap_or_else(|| constants().model.clone())
  }

  pub fn api_base_url(&self) -> String {
    self.api_base_url.clone().filter(|u| !u.trim().is_empty()).unwrap_or_else(|| constants().api_base_url.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn api_key_prefers_environment() {
    let key = Config::pick_api_key(Some("env-key".into()), Some("file-key".into()));
    assert_eq!(key.as_deref(), Some("env-key"));
  }

  #[test]
  fn api_key_blank_environment_falls_through() {
    let key = Config::pick_api_key(Some("   ".into()), Some(" file-key ".into()));
    assert_eq!(key.as_deref(), Some("file-key"));
  }

  #[test]
  fn api_key_absent() {
    assert_eq!(Config::pick_api_key(None, None), None);
    assert_eq!(Config::pick_api_key(None, Some(String::new())), None);
  }

  #[test]
  fn model_defaults_to_constant() {
    let config = Config::default();
    assert_eq!(config.model(), constants().model);
    let config = Config { model: Some("custom-model".into()), ..Config::default() };
    assert_eq!(config.model(), "custom-model");
  }

  #[test]
  fn config_toml_round_trip_keeps_unset_fields_empty() {
    let config = Config { origin: Some("https://example.test/games/".into()), ..Config::default() };
    let text = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
    assert!(parsed.api_key.is_none());
  }
}
