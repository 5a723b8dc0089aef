//! Pipeline configuration.
//!
//! Read from an optional TOML file, then overridden by `REJSTRIK_*`
//! environment variables (`REJSTRIK_STORE_PATH`, `REJSTRIK_BATCH_SIZE`, ...).
//! Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use chrono::{Datelike as _, Utc};
use rejstrik_core::load::DEFAULT_BATCH_SIZE;
use serde::Deserialize;

use crate::Result;

/// Runtime configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Directory scanned recursively for source documents.
  pub input_dir:      PathBuf,
  /// SQLite graph store. A leading `~/` is expanded.
  pub store_path:     PathBuf,
  /// Where the intermediate snapshot JSON is written and read.
  pub snapshot_path:  PathBuf,
  pub batch_size:     usize,
  /// Keep only contracts where this IČO is a party.
  pub filter_ico:     Option<String>,
  /// Year assigned to contracts with no date at all. Defaults to the
  /// current year.
  pub reference_year: Option<i32>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      input_dir:      PathBuf::from("data"),
      store_path:     PathBuf::from("rejstrik.sqlite"),
      snapshot_path:  PathBuf::from("graph_snapshot.json"),
      batch_size:     DEFAULT_BATCH_SIZE,
      filter_ico:     None,
      reference_year: None,
    }
  }
}

impl PipelineConfig {
  /// Layer `file` (if it exists) and the environment over the defaults.
  pub fn load(file: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("REJSTRIK").try_parsing(true))
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  /// `store_path` with a leading `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn reference_year(&self) -> i32 {
    self.reference_year.unwrap_or_else(|| Utc::now().year())
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.batch_size, 100);
    assert_eq!(cfg.input_dir, PathBuf::from("data"));
    assert_eq!(cfg.filter_ico, None);
  }

  #[test]
  fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rejstrik.toml");
    std::fs::write(
      &path,
      "input_dir = \"raw\"\nbatch_size = 25\nfilter_ico = \"70886288\"\nreference_year = 2024\n",
    )
    .unwrap();

    let cfg = PipelineConfig::load(&path).unwrap();
    assert_eq!(cfg.input_dir, PathBuf::from("raw"));
    assert_eq!(cfg.batch_size, 25);
    assert_eq!(cfg.filter_ico.as_deref(), Some("70886288"));
    assert_eq!(cfg.reference_year(), 2024);
    assert_eq!(cfg.snapshot_path, PathBuf::from("graph_snapshot.json"));
  }

  #[test]
  fn tilde_is_expanded_only_at_the_start() {
    let plain = PipelineConfig { store_path: "db/a~/b.sqlite".into(), ..Default::default() };
    assert_eq!(plain.resolved_store_path(), PathBuf::from("db/a~/b.sqlite"));

    if let Ok(home) = std::env::var("HOME") {
      let cfg = PipelineConfig { store_path: "~/graph.sqlite".into(), ..Default::default() };
      assert_eq!(cfg.resolved_store_path(), PathBuf::from(home).join("graph.sqlite"));
    }
  }
}
