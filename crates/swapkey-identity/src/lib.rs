//! Machine-identity regeneration.
//!
//! [`generate`] produces a fresh [`MachineIdentitySet`] from the OS random
//! source; [`IdentityPersister`] merges it into the host's side JSON document
//! with bounded retry.
//!
//! [`MachineIdentitySet`]: swapkey_core::identity::MachineIdentitySet

mod generate;
mod persist;

pub mod error;

pub use error::{Error, Result};
pub use generate::generate;
pub use persist::{DocumentIo, FsDocument, IdentityPersister, RetryPolicy};
