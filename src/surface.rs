use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::catalog::CatalogEntry;
use crate::constants::constants;
use crate::launcher::DisplaySurface;

const LOADING_PAGE: &str = "<!doctype html><html><head><title>Loading…</title></head><body>Loading…</body></html>";

/// A local HTML file standing in for a fresh browser tab.
///
/// The file is created with a loading page when acquired, overwritten with the game
/// document on success, and removed again on close.
#[derive(Debug)]
pub struct FileSurface {
  path: PathBuf,
}

impl FileSurface {
  pub fn acquire(path: PathBuf) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, LOADING_PAGE).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(Self { path })
  }

  /// `<tmp>/gamestash/<filename>.html`
  pub fn default_path(entry: &CatalogEntry) -> PathBuf {
    let ext = constants().resource_extension.as_str();
    let name =
      if entry.filename.ends_with(ext) { entry.filename.clone() } else { format!("{}{}", entry.filename, ext) };
    std::env::temp_dir().join("gamestash").join(name)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Hand the file to the platform's default opener.
  pub async fn open(&self) -> Result<()> {
    let (program, args): (&str, &[&str]) = if cfg!(target_os = "macos") {
      ("open", &[])
    } else if cfg!(target_os = "windows") {
      ("cmd", &["/C", "start", ""])
    } else {
      ("xdg-open", &[])
    };

    let status = Command::new(program)
      .args(args)
      .arg(&self.path)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .status()
      .await
      .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
          anyhow!("{program} not found. Open {} in a browser yourself.", self.path.display())
        } else {
          anyhow!(e).context(format!("Failed to run {program}"))
        }
      })?;
    if !status.success() {
      return Err(anyhow!("{program} exited with {status}"));
    }
    Ok(())
  }
}

impl DisplaySurface for FileSurface {
  fn show(&mut self, title: &str, content: &str) -> std::io::Result<()> {
    std::fs::write(&self.path, with_title(content, title))
  }

  fn close(self) {
    let _ = std::fs::remove_file(&self.path);
  }
}

fn escape_html(text: &str) -> String {
  text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Set the document title, replacing an existing `<title>` if there is one.
fn with_title(content: &str, title: &str) -> String {
  let title = escape_html(title);
  // ASCII lowercasing keeps byte offsets identical.
  let lower = content.to_ascii_lowercase();

  if let Some(open) = lower.find("<title")
    && let Some(open_end) = lower[open..].find('>').map(|i| open + i + 1)
    && let Some(close) = lower[open_end..].find("</title>").map(|i| open_end + i)
  {
    return format!("{}{}{}", &content[..open_end], title, &content[close..]);
  }
  if let Some(head) = lower.find("<head")
    && let Some(head_end) = lower[head..].find('>').map(|i| head + i + 1)
  {
    return format!("{}<title>{}</title>{}", &content[..head_end], title, &content[head_end..]);
  }
  format!("<title>{}</title>{}", title, content)
}
