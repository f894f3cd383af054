//! Account-switch orchestration.
//!
//! [`SwitchOrchestrator`] runs the patch check, a best-effort logout, a
//! best-effort machine-identity reset, and then tries to hand the new
//! credentials to the running host. When the live handoff is unavailable it
//! writes the active-account records straight into the state database and
//! asks the host to reload.

mod fallback;
mod orchestrator;

pub mod error;
pub mod events;
pub mod paths;

pub use error::{Error, Result};
pub use events::{StepEvent, SwitchStep};
pub use fallback::write_active_account;
pub use orchestrator::{Host, SwitchOrchestrator};
pub use paths::SwitchPaths;
