//! Error type for `swapkey-identity`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// Every write attempt failed; `source` is the last failure.
  #[error("identity document write failed after {attempts} attempts: {source}")]
  RetryExhausted {
    attempts: u32,
    #[source]
    source:   std::io::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
