//! Error type for `rejstrik-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A node row reached the store without its identity property.
  #[error("{label} row {index} has no {key_field:?} value")]
  MissingKey {
    label:     &'static str,
    index:     usize,
    key_field: String,
  },

  #[error("stored properties for {0} are not a JSON object")]
  NotAnObject(String),
}

impl Error {
  /// Whether the database itself is gone, as opposed to one bad batch.
  pub fn is_fatal(&self) -> bool {
    use rusqlite::ErrorCode;

    match self {
      Error::Database(tokio_rusqlite::Error::ConnectionClosed) => true,
      Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
        e,
        _,
      ))) => matches!(
        e.code,
        ErrorCode::CannotOpen
          | ErrorCode::DiskFull
          | ErrorCode::SystemIoFailure
          | ErrorCode::DatabaseCorrupt
          | ErrorCode::NotADatabase
      ),
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
