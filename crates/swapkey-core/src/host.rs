//! Capabilities the host application and the profile repository provide.
//!
//! The orchestrator is generic over these traits and knows nothing about how
//! they are implemented (extension commands, child processes, test fakes).

use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::profile::CredentialProfile;

// ─── Patch check ─────────────────────────────────────────────────────────────

/// What the patch check found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchStatus {
  /// The live-injection command is installed and usable.
  Ready,
  /// A patch was just applied; the host must restart before it takes effect.
  NeedsRestart,
  /// The patch could not be verified or applied.
  Failed(String),
}

pub trait PatchService: Send + Sync {
  fn check_and_apply(&self) -> impl Future<Output = PatchStatus> + Send + '_;
}

// ─── Commands ────────────────────────────────────────────────────────────────

/// Failure of an external host command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
  #[error("command unavailable: {0}")]
  Unavailable(String),

  #[error("command failed: {0}")]
  Failed(String),
}

/// Live-injection failure. Either variant sends the orchestrator down the
/// fallback path.
pub type InjectError = CommandError;

/// In-process handoff of a credential set to the running host.
pub trait SessionInjector: Send + Sync {
  fn attempt<'a>(
    &'a self,
    api_key: &'a str,
    display_name: &'a str,
    server_url: &'a str,
  ) -> impl Future<Output = Result<(), InjectError>> + Send + 'a;
}

pub trait LogoutCommand: Send + Sync {
  fn logout(&self) -> impl Future<Output = Result<(), CommandError>> + Send + '_;
}

/// Fire-and-forget request that the host restart after `delay`.
pub trait ReloadSignal: Send + Sync {
  fn schedule_reload(&self, delay: Duration);
}

// ─── Profiles ────────────────────────────────────────────────────────────────

/// Saved-profile storage. Secrets are resolved transparently on reads.
pub trait ProfileRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All profiles, oldest first.
  fn list(
    &self,
  ) -> impl Future<Output = Result<Vec<CredentialProfile>, Self::Error>> + Send + '_;

  fn get<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<CredentialProfile>, Self::Error>> + Send + 'a;

  /// Insert or update; secrets are split off and stored separately.
  fn save<'a>(
    &'a self,
    profile: &'a CredentialProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove a profile and purge its secrets. Returns whether it existed.
  fn remove<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
