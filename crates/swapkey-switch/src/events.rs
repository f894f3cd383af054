//! Step events emitted while a switch runs.
//!
//! Purely diagnostic: a closed or absent observer never changes what the
//! orchestrator does.

use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchStep {
  PatchCheck,
  Logout,
  IdentityReset,
  SessionInject,
  Fallback,
  Done,
}

impl fmt::Display for SwitchStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::PatchCheck => "patch-check",
      Self::Logout => "logout",
      Self::IdentityReset => "identity-reset",
      Self::SessionInject => "session-inject",
      Self::Fallback => "fallback",
      Self::Done => "done",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone)]
pub struct StepEvent {
  pub at:      DateTime<Utc>,
  pub step:    SwitchStep,
  pub message: String,
}

impl fmt::Display for StepEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}] {}: {}", self.at.to_rfc3339(), self.step, self.message)
  }
}
