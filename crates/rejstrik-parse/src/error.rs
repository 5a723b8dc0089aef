//! Error types for the source parsers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed XML: {0}")]
  Xml(String),

  #[error("XML document has no root element")]
  EmptyDocument,

  #[error("unsupported character encoding: {0}")]
  Encoding(String),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("expected a JSON array of objects, found {0}")]
  NotAnArray(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
