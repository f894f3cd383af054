//! [`SwitchOrchestrator`]: the end-to-end credential swap.
//!
//! Steps run strictly in order:
//!
//! 1. patch check: fatal; a pending restart aborts the switch and schedules a
//!    reload;
//! 2. logout: best-effort;
//! 3. identity reset: best-effort;
//! 4. session inject: on failure, fall back to writing the active-account
//!    records directly and scheduling a reload.
//!
//! Nothing here guards against two switches running at once, or against the
//! host writing the state database mid-cycle. Callers serialise switches.

use std::time::Duration;

use chrono::Utc;
use swapkey_core::{
  host::{CommandError, LogoutCommand, PatchService, PatchStatus, ProfileRepository, ReloadSignal, SessionInjector},
  identity::MachineIdentitySet,
  outcome::SwitchOutcome,
  profile::CredentialProfile,
  snapshot::SERVICE_MACHINE_ID_KEY,
};
use swapkey_identity::{DocumentIo, FsDocument, IdentityPersister};
use swapkey_store_sqlite::KvStore;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::{
  Result,
  error::innermost_message,
  events::{StepEvent, SwitchStep},
  fallback::write_active_account,
};

/// Delay before a scheduled host reload.
pub const DEFAULT_RELOAD_DELAY: Duration = Duration::from_millis(1500);

/// The host-side capabilities a switch needs.
pub struct Host<P, L, J, R> {
  pub patch:    P,
  pub logout:   L,
  pub injector: J,
  pub reload:   R,
}

pub struct SwitchOrchestrator<P, L, J, R, D = FsDocument> {
  store:        KvStore,
  persister:    IdentityPersister<D>,
  host:         Host<P, L, J, R>,
  reload_delay: Duration,
  observer:     Option<UnboundedSender<StepEvent>>,
}

impl<P, L, J, R, D> SwitchOrchestrator<P, L, J, R, D>
where
  P: PatchService,
  L: LogoutCommand,
  J: SessionInjector,
  R: ReloadSignal,
  D: DocumentIo,
{
  pub fn new(store: KvStore, persister: IdentityPersister<D>, host: Host<P, L, J, R>) -> Self {
    Self {
      store,
      persister,
      host,
      reload_delay: DEFAULT_RELOAD_DELAY,
      observer: None,
    }
  }

  pub fn with_reload_delay(mut self, delay: Duration) -> Self {
    self.reload_delay = delay;
    self
  }

  /// Receive a [`StepEvent`] for every step taken.
  pub fn with_observer(mut self, observer: UnboundedSender<StepEvent>) -> Self {
    self.observer = Some(observer);
    self
  }

  pub fn store(&self) -> &KvStore { &self.store }

  pub fn host(&self) -> &Host<P, L, J, R> { &self.host }

  // ── Entry points ──────────────────────────────────────────────────────────

  /// Look up `id` in `repo` and switch to it.
  pub async fn switch_profile<Repo: ProfileRepository>(
    &self,
    repo: &Repo,
    id: &str,
  ) -> SwitchOutcome {
    match repo.get(id).await {
      Ok(Some(profile)) => self.switch_to(&profile).await,
      Ok(None) => SwitchOutcome::failed(format!("profile not found: {id}")),
      Err(e) => SwitchOutcome::failed(innermost_message(&e)),
    }
  }

  /// Make `profile` the active account in the host.
  pub async fn switch_to(&self, profile: &CredentialProfile) -> SwitchOutcome {
    info!(profile = %profile.id, email = %profile.email, "switch started");

    // 1. Patch check.
    self.emit(SwitchStep::PatchCheck, "checking injection patch");
    match self.host.patch.check_and_apply().await {
      PatchStatus::Ready => {}
      PatchStatus::NeedsRestart => {
        self.emit(SwitchStep::PatchCheck, "patch applied, host restart required");
        self.host.reload.schedule_reload(self.reload_delay);
        return SwitchOutcome::restart_required();
      }
      PatchStatus::Failed(msg) => {
        self.emit(SwitchStep::PatchCheck, format!("patch check failed: {msg}"));
        return SwitchOutcome::failed(msg);
      }
    }

    // 2. Logout.
    self.emit(SwitchStep::Logout, "logging out current account");
    if let Err(e) = self.logout().await {
      warn!(error = %e, "logout failed, continuing");
      self.emit(SwitchStep::Logout, format!("ignored: {e}"));
    }

    // 3. Identity reset.
    self.emit(SwitchStep::IdentityReset, "regenerating machine identity");
    match self.reset_identity().await {
      Ok(ids) => {
        self.emit(SwitchStep::IdentityReset, format!("new machine id {}", ids.machine_id));
      }
      Err(e) => {
        warn!(error = %e, "identity reset failed, continuing");
        self.emit(SwitchStep::IdentityReset, format!("ignored: {e}"));
      }
    }

    // 4. Session inject, or fall back to a direct write plus reload.
    self.emit(SwitchStep::SessionInject, "injecting session");
    let injected = self
      .host
      .injector
      .attempt(&profile.api_key, &profile.display_name, &profile.api_server_url)
      .await;

    match injected {
      Ok(()) => {
        if let Err(e) = write_active_account(&self.store, profile).await {
          warn!(error = %e, "backstop write after live injection failed");
        }
        self.emit(SwitchStep::Done, "switched live");
        SwitchOutcome::succeeded()
      }
      Err(e) => {
        self.emit(SwitchStep::Fallback, format!("live injection unavailable ({e}), writing state"));
        match write_active_account(&self.store, profile).await {
          Ok(()) => {
            self.host.reload.schedule_reload(self.reload_delay);
            self.emit(SwitchStep::Done, "state written, reload scheduled");
            SwitchOutcome::succeeded()
          }
          Err(e) => {
            warn!(error = %e, "fallback write failed");
            self.emit(SwitchStep::Fallback, format!("fallback write failed: {e}"));
            SwitchOutcome::failed(innermost_message(&e))
          }
        }
      }
    }
  }

  // ── Best-effort steps ─────────────────────────────────────────────────────
  //
  // Both return their error to `switch_to`, which logs and discards it.

  async fn logout(&self) -> Result<(), CommandError> {
    self.host.logout.logout().await
  }

  /// Generate and persist a new identity set, then record the service
  /// machine id in the state database.
  pub async fn reset_identity(&self) -> Result<MachineIdentitySet> {
    let ids = swapkey_identity::generate();
    let ids = self.persister.persist(&ids).await?;
    self
      .store
      .write(SERVICE_MACHINE_ID_KEY, ids.service_machine_id.as_str())
      .await?;
    Ok(ids)
  }

  fn emit(&self, step: SwitchStep, message: impl Into<String>) {
    let event = StepEvent { at: Utc::now(), step, message: message.into() };
    info!(step = %event.step, "{}", event.message);
    if let Some(observer) = &self.observer {
      let _ = observer.send(event);
    }
  }
}
