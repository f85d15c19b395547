//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! with no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Generative API
  pub api_base_url: String,
  pub model: String,
  pub match_min: usize,
  pub match_max: usize,
  pub summary_max_words: usize,
  pub summary_max_sentences: usize,

  // Resource origin
  pub encoded_origin: String,
  pub resource_extension: String,

  // Catalog
  pub filename_prefix: String,
  pub default_category: String,
  pub default_tag: String,

  // Result paging
  pub page_initial_size: usize,
  pub page_step: usize,

  pub describe_concurrency: usize,
  pub quick_searches: Vec<String>,

  /// Filenames the catalog is built from when no `--catalog` file is given.
  pub game_files: Vec<String>,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
