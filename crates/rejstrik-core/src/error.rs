//! Error types for `rejstrik-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown node kind: {0:?}")]
  UnknownNodeKind(String),

  #[error("unknown relationship type: {0:?}")]
  UnknownRelKind(String),

  #[error("unknown data source: {0:?}")]
  UnknownSource(String),

  /// A fatal store error aborted the load; earlier batches stay committed.
  #[error("store unavailable while loading {label}: {message}")]
  StoreUnavailable { label: String, message: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
