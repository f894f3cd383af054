//! Error type for `swapkey-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The value cannot be stored so that it reads back unchanged.
  #[error("refusing to store value under {key:?}: {reason}")]
  InvalidValue { key: String, reason: &'static str },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
