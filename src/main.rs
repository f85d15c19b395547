mod ai;
mod app;
mod catalog;
mod config;
mod constants;
mod detail;
mod launcher;
mod resolver;
mod surface;
#[cfg(test)]
mod testutil;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::borrow::Borrow;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use catalog::{Catalog, CatalogEntry, Pager, parse_filename_list};
use config::Config;
use constants::constants;
use resolver::local_match;
use surface::FileSurface;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Browse, search and launch HTML5 games")]
struct Args {
  /// Newline-delimited list of game filenames to use instead of the built-in catalog
  #[arg(long, global = true)]
  catalog: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the catalog
  List {
    /// Only games filed under this letter ('#' for names starting with a digit or symbol)
    #[arg(short, long)]
    letter: Option<char>,
    /// How many pages of results to show
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pages: u16,
  },
  /// Show the letter index
  Letters,
  /// Search with a natural-language query
  Search {
    #[arg(required = true)]
    query: Vec<String>,
    /// How many pages of results to show
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pages: u16,
    /// Fetch a short blurb for every shown result
    #[arg(short, long)]
    describe: bool,
  },
  /// Show a game's details with a freshly generated blurb
  Show {
    #[arg(required = true)]
    name: Vec<String>,
  },
  /// Pick a random game and show its details
  Random,
  /// Download a game and write it to a local HTML file
  Launch {
    #[arg(required = true)]
    name: Vec<String>,
    /// Where to write the game (default: a file under the system temp directory)
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Open the written file with the system's default browser
    #[arg(long)]
    open: bool,
  },
  /// Store preferences
  Config {
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    api_base_url: Option<String>,
    /// Plain base URL games are fetched from
    #[arg(long)]
    origin: Option<String>,
  },
}

// --- Helpers ---

fn init_logging() -> Option<WorkerGuard> {
  let dir = config::data_dir()?;
  std::fs::create_dir_all(&dir).ok()?;
  let appender = tracing_appender::rolling::never(&dir, "gamestash.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gamestash=info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

fn load_catalog(path: Option<&PathBuf>) -> Result<Catalog> {
  match path {
    Some(path) => {
      let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
      let files = parse_filename_list(&text);
      if files.is_empty() {
        return Err(anyhow!("{} lists no games", path.display()));
      }
      Ok(Catalog::from_filenames(&files))
    }
    None => Ok(Catalog::from_filenames(&constants().game_files)),
  }
}

fn pager(pages: u16) -> Pager {
  let mut pager = Pager::default();
  for _ in 1..pages {
    pager.load_more();
  }
  pager
}

fn print_entries<E: Borrow<CatalogEntry>>(entries: &[E], pages: u16) {
  let pager = pager(pages);
  for entry in pager.window(entries) {
    let entry = entry.borrow();
    println!("  {:<32} [{}]  {}", entry.display_name, entry.badge(), entry.id);
  }
  if pager.has_more(entries.len()) {
    let hidden = entries.len() - pager.window(entries).len();
    println!("  … {} more (use --pages {})", hidden, pages.saturating_add(1));
  }
}

fn print_detail(entry: &CatalogEntry) {
  println!("{}", entry.display_name);
  println!("  {} · {} · {}", entry.badge(), entry.category, entry.tags.join(", "));
  println!("  file: {}", entry.filename);
  println!();
  println!("  {}", entry.description);
}

fn find_entry<'a>(app: &'a App, name: &[String]) -> Result<&'a CatalogEntry> {
  let name = name.join(" ");
  if let Some(entry) = app.catalog.find(&name) {
    return Ok(entry);
  }
  let suggestions: Vec<String> =
    local_match(&name, app.catalog.entries()).into_iter().take(5).map(|e| e.display_name).collect();
  if suggestions.is_empty() {
    Err(anyhow!("No game named '{}'", name))
  } else {
    Err(anyhow!("No game named '{}'. Did you mean: {}?", name, suggestions.join(", ")))
  }
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = init_logging();
  run(args).await
}

async fn run(args: Args) -> Result<()> {
  let mut config = Config::load();

  let catalog = load_catalog(args.catalog.as_ref())?;
  let mut app = App::new(catalog, &config);

  match args.command {
    Command::List { letter, pages } => {
      let entries: Vec<&CatalogEntry> = match letter {
        Some(letter) => app.catalog.by_letter(letter),
        None => app.catalog.entries().iter().collect(),
      };
      if entries.is_empty() {
        println!("No games listed.");
      } else {
        print_entries(&entries, pages);
      }
    }
    Command::Letters => {
      if app.catalog.is_empty() {
        println!("No games listed.");
        return Ok(());
      }
      let letters: Vec<String> = app.catalog.letters().iter().map(char::to_string).collect();
      println!("{}", letters.join(" "));
    }
    Command::Search { query, pages, describe } => {
      let query = query.join(" ");
      let res = app.search(&query).await;
      if res.entries.is_empty() {
        println!("No games match '{}'.", query.trim());
        println!("  Try: {}", constants().quick_searches.join(", "));
        return Ok(());
      }
      let source = if res.ok { "ai match" } else { "local match" };
      println!("Found {} games ({})", res.entries.len(), source);
      if res.stale {
        println!("  (superseded by a newer search)");
      }
      if describe {
        let shown = pager(pages).window(&res.entries).to_vec();
        for (id, text) in app.describe_all(&shown).await {
          if let Some(entry) = app.catalog.get(&id) {
            println!("  {}: {}", entry.display_name, text);
          }
        }
      } else {
        print_entries(&res.entries, pages);
      }
    }
    Command::Show { name } => {
      let id = find_entry(&app, &name)?.id.clone();
      if let Some(entry) = app.open_detail(&id).await {
        print_detail(entry);
      }
    }
    Command::Random => {
      let id = app.catalog.random(&mut rand::thread_rng()).map(|e| e.id.clone()).context("The catalog is empty")?;
      if let Some(entry) = app.open_detail(&id).await {
        print_detail(entry);
      }
    }
    Command::Launch { name, out, open } => {
      let entry = find_entry(&app, &name)?.clone();
      let path = out.unwrap_or_else(|| FileSurface::default_path(&entry));
      let surface = FileSurface::acquire(path)?;
      let surface = app.launch(surface, &entry).await.context("Failed to load game data.")?;
      println!("{} written to {}", entry.display_name, surface.path().display());
      if open {
        surface.open().await?;
      }
    }
    Command::Config { api_key, model, api_base_url, origin } => {
      config.api_key = api_key.or(config.api_key);
      config.model = model.or(config.model);
      config.api_base_url = api_base_url.or(config.api_base_url);
      config.origin = origin.or(config.origin);
      let path = config.save()?;
      println!("Saved preferences to {}", path.display());
    }
  }
  Ok(())
}
