//! Error type for `swapkey-switch`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("identity error: {0}")]
  Identity(#[from] swapkey_identity::Error),

  #[error("store error: {0}")]
  Store(#[from] swapkey_store_sqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("cannot resolve host paths: {0} is not set")]
  MissingEnv(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The message of the deepest error in `err`'s source chain.
pub fn innermost_message(err: &(dyn std::error::Error + 'static)) -> String {
  let mut current = err;
  while let Some(next) = current.source() {
    current = next;
  }
  current.to_string()
}
