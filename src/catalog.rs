use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

use crate::constants::constants;

/// Letter-index bucket for names that don't start with a letter.
pub const NON_LETTER_BUCKET: char = '#';

/// One playable game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
  /// Same as `filename`; the unique key.
  pub id: String,
  pub filename: String,
  pub display_name: String,
  pub category: String,
  pub genres: Vec<String>,
  pub tags: Vec<String>,
  /// Written only with Detail Fetcher output.
  pub description: String,
}

impl CatalogEntry {
  pub fn from_filename(filename: &str) -> Self {
    let c = constants();
    Self {
      id: filename.to_string(),
      filename: filename.to_string(),
      display_name: display_name(filename),
      category: c.default_category.clone(),
      genres: Vec::new(),
      tags: vec![c.default_tag.clone()],
      description: String::new(),
    }
  }

  /// Short label shown on a card: first genre, or `GAME`.
  pub fn badge(&self) -> &str {
    self.genres.first().map(String::as_str).unwrap_or("GAME")
  }

  /// Letter-index bucket this entry is listed under.
  pub fn letter(&self) -> char {
    match self.display_name.chars().next() {
      Some(ch) if ch.is_alphabetic() => ch.to_uppercase().next().unwrap_or(ch),
      _ => NON_LETTER_BUCKET,
    }
  }
}

/// Derive a human-readable name from a raw game filename.
///
/// `clMazeRunner.html` → `Maze Runner`, `ghost-hunt.html` → `Ghost hunt`.
/// Never returns an empty string for a non-empty filename: if nothing is left after
/// cleaning, the filename itself is returned.
pub fn display_name(filename: &str) -> String {
  let c = constants();
  let prefix_len = c.filename_prefix.len();
  let mut name = filename;
  if name.get(..prefix_len).is_some_and(|p| p.eq_ignore_ascii_case(&c.filename_prefix)) {
    name = &name[prefix_len..];
  }
  let name = name.strip_suffix(c.resource_extension.as_str()).unwrap_or(name);

  let mut spaced = String::with_capacity(name.len() + 8);
  for ch in name.chars() {
    match ch {
      '-' | '_' => spaced.push(' '),
      ch if ch.is_ascii_uppercase() => {
        spaced.push(' ');
        spaced.push(ch);
      }
      ch => spaced.push(ch),
    }
  }
  let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");

  let mut chars = collapsed.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => filename.to_string(),
  }
}

/// Build the catalog entries for a list of raw filenames.
///
/// Duplicate filenames keep their first occurrence. The result is sorted by display name,
/// case-insensitively; equal names keep their input order.
pub fn build<S: AsRef<str>>(raw_filenames: &[S]) -> Vec<CatalogEntry> {
  let mut seen = HashSet::new();
  let mut entries: Vec<CatalogEntry> = raw_filenames
    .iter()
    .map(AsRef::<str>::as_ref)
    .filter(|f| seen.insert(*f))
    .map(CatalogEntry::from_filename)
    .collect();
  entries.sort_by_cached_key(|e| e.display_name.to_lowercase());
  entries
}

/// Parse a newline-delimited filename list. Blank lines and `#` comments are skipped.
pub fn parse_filename_list(text: &str) -> Vec<String> {
  text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')).map(str::to_string).collect()
}

/// The in-memory catalog, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  entries: Vec<CatalogEntry>,
}

impl Catalog {
  pub fn from_filenames<S: AsRef<str>>(raw_filenames: &[S]) -> Self {
    Self { entries: build(raw_filenames) }
  }

  pub fn entries(&self) -> &[CatalogEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
    self.entries.iter().find(|e| e.id == id)
  }

  /// Look an entry up by id, or by display name (case-insensitive).
  pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
    let name = name.trim();
    self.get(name).or_else(|| self.entries.iter().find(|e| e.display_name.eq_ignore_ascii_case(name)))
  }

  /// Store a fetched description on an entry. Returns `false` for unknown ids.
  pub fn set_description(&mut self, id: &str, description: &str) -> bool {
    match self.entries.iter_mut().find(|e| e.id == id) {
      Some(entry) => {
        entry.description = description.to_string();
        true
      }
      None => false,
    }
  }

  /// Distinct letter buckets, sorted, `#` first.
  pub fn letters(&self) -> Vec<char> {
    let mut letters: Vec<char> = self.entries.iter().map(CatalogEntry::letter).collect();
    letters.sort_unstable();
    letters.dedup();
    letters
  }

  pub fn by_letter(&self, letter: char) -> Vec<&CatalogEntry> {
    let letter = letter.to_uppercase().next().unwrap_or(letter);
    self.entries.iter().filter(|e| e.letter() == letter).collect()
  }

  pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&CatalogEntry> {
    self.entries.choose(rng)
  }
}

/// A growing window over a result list: starts small, grows by a fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
  visible: usize,
}

impl Default for Pager {
  fn default() -> Self {
    Self { visible: constants().page_initial_size }
  }
}

impl Pager {
  pub fn load_more(&mut self) {
    self.visible += constants().page_step;
  }

  pub fn window<'a, T>(&self, items: &'a [T]) -> &'a [T] {
    &items[..self.visible.min(items.len())]
  }

  pub fn has_more(&self, total: usize) -> bool {
    total > self.visible
  }
}
