//! Error type for the pipeline library.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot read {path:?}: {source}")]
  Read {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("cannot write {path:?}: {source}")]
  Write {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("core error: {0}")]
  Core(#[from] rejstrik_core::Error),

  #[error("store error: {0}")]
  Store(#[from] rejstrik_store_sqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
