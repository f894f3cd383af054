//! Host capabilities backed by external programs.
//!
//! Each capability runs a configured argv. A capability with no configured
//! program, or whose program cannot be found, reports itself unavailable.
//! Credentials are passed through the environment, never on the command
//! line.

use std::{process::Output, sync::Mutex, time::Duration};

use swapkey_core::host::{
  CommandError, InjectError, LogoutCommand, PatchService, PatchStatus, ReloadSignal,
  SessionInjector,
};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exit status a patch program uses to say "applied, restart the host".
pub const NEEDS_RESTART_EXIT_CODE: i32 = 3;

// ─── Command runner ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExternalCommand {
  label: &'static str,
  argv:  Option<Vec<String>>,
}

impl ExternalCommand {
  pub fn new(label: &'static str, argv: Option<Vec<String>>) -> Self {
    Self { label, argv: argv.filter(|a| !a.is_empty()) }
  }

  pub fn is_configured(&self) -> bool { self.argv.is_some() }

  fn command(&self) -> Result<Command, CommandError> {
    let argv = self
      .argv
      .as_ref()
      .ok_or_else(|| CommandError::Unavailable(format!("no {} command configured", self.label)))?;
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]).kill_on_drop(true);
    Ok(cmd)
  }

  async fn output(&self, env: &[(&str, &str)]) -> Result<Output, CommandError> {
    let mut cmd = self.command()?;
    cmd.envs(env.iter().copied());
    debug!(label = self.label, "running host command");
    cmd.output().await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        CommandError::Unavailable(format!("{} program not found", self.label))
      } else {
        CommandError::Failed(format!("{}: {e}", self.label))
      }
    })
  }

  /// Run to completion; a non-zero exit is a failure carrying stderr.
  async fn run(&self, env: &[(&str, &str)]) -> Result<(), CommandError> {
    let output = self.output(env).await?;
    if output.status.success() {
      Ok(())
    } else {
      Err(CommandError::Failed(failure_text(self.label, &output)))
    }
  }
}

fn failure_text(label: &str, output: &Output) -> String {
  let stderr = String::from_utf8_lossy(&output.stderr);
  let stderr = stderr.trim();
  if stderr.is_empty() {
    format!("{label} exited with {}", output.status)
  } else {
    format!("{label}: {stderr}")
  }
}

// ─── Capabilities ────────────────────────────────────────────────────────────

pub struct CommandPatch(pub ExternalCommand);

impl PatchService for CommandPatch {
  async fn check_and_apply(&self) -> PatchStatus {
    if !self.0.is_configured() {
      return PatchStatus::Ready;
    }
    match self.0.output(&[]).await {
      Ok(out) if out.status.success() => PatchStatus::Ready,
      Ok(out) if out.status.code() == Some(NEEDS_RESTART_EXIT_CODE) => PatchStatus::NeedsRestart,
      Ok(out) => PatchStatus::Failed(failure_text("patch", &out)),
      Err(e) => PatchStatus::Failed(e.to_string()),
    }
  }
}

pub struct CommandLogout(pub ExternalCommand);

impl LogoutCommand for CommandLogout {
  async fn logout(&self) -> Result<(), CommandError> {
    self.0.run(&[]).await
  }
}

pub struct CommandInjector(pub ExternalCommand);

impl SessionInjector for CommandInjector {
  async fn attempt(
    &self,
    api_key: &str,
    display_name: &str,
    server_url: &str,
  ) -> Result<(), InjectError> {
    self
      .0
      .run(&[
        ("SWAPKEY_API_KEY", api_key),
        ("SWAPKEY_DISPLAY_NAME", display_name),
        ("SWAPKEY_SERVER_URL", server_url),
      ])
      .await
  }
}

/// Records reload requests; [`DeferredReload::run_pending`] carries them out
/// before the process exits.
pub struct DeferredReload {
  command: ExternalCommand,
  pending: Mutex<Option<Duration>>,
}

impl DeferredReload {
  pub fn new(command: ExternalCommand) -> Self {
    Self { command, pending: Mutex::new(None) }
  }

  /// Wait out the requested delay and launch the reload program. Returns
  /// whether a reload had been requested.
  pub async fn run_pending(&self) -> bool {
    let pending = self.pending.lock().ok().and_then(|mut p| p.take());
    let Some(delay) = pending else {
      return false;
    };

    tokio::time::sleep(delay).await;
    if !self.command.is_configured() {
      info!("no reload command configured; restart the host to apply the switch");
      return true;
    }
    match self.command.command() {
      Ok(mut cmd) => {
        cmd.kill_on_drop(false);
        if let Err(e) = cmd.spawn() {
          warn!(error = %e, "failed to launch reload command");
        }
      }
      Err(e) => warn!(error = %e, "reload unavailable"),
    }
    true
  }
}

impl ReloadSignal for DeferredReload {
  fn schedule_reload(&self, delay: Duration) {
    if let Ok(mut pending) = self.pending.lock() {
      *pending = Some(delay);
    }
  }
}
