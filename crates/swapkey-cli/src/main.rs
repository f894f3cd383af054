//! `swapkey` — switch the active account of a running host application.
//!
//! # Usage
//!
//! ```text
//! swapkey add --email ada@example.com --name Ada --api-key sk-...
//! swapkey list
//! swapkey switch <profile-id>
//! swapkey --config ~/.config/swapkey/config.toml backup
//! ```

mod host;
mod profiles;
mod settings;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use host::{CommandInjector, CommandLogout, CommandPatch, DeferredReload, ExternalCommand};
use profiles::FileProfileRepository;
use settings::{Settings, expand_tilde};
use swapkey_core::{
  host::ProfileRepository,
  profile::{CredentialProfile, NewProfile},
};
use swapkey_identity::{IdentityPersister, RetryPolicy};
use swapkey_store_sqlite::{KvStore, StoreValue};
use swapkey_switch::{Host, SwitchOrchestrator};
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

type Orchestrator = SwitchOrchestrator<CommandPatch, CommandLogout, CommandInjector, DeferredReload>;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Switch between saved accounts of a host application")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "~/.config/swapkey/config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
  /// List saved profiles.
  List,

  /// Save a new profile.
  Add {
    #[arg(long)]
    email:         String,
    #[arg(long)]
    name:          String,
    #[arg(long, env = "SWAPKEY_NEW_API_KEY")]
    api_key:       String,
    #[arg(long)]
    server_url:    Option<String>,
    #[arg(long)]
    refresh_token: Option<String>,
    #[arg(long)]
    plan:          Option<String>,
  },

  /// Delete a profile and its secrets.
  Remove { id: String },

  /// Make a profile the active account.
  Switch { id: String },

  /// Copy the host state database next to itself.
  Backup,

  /// Show keys (and values) in the host state database.
  Inspect {
    /// SQL `LIKE` pattern.
    #[arg(default_value = "%")]
    pattern: String,
  },

  /// Regenerate machine identifiers without switching accounts.
  ResetIdentity,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&expand_tilde(&cli.config))?;
  let repo = FileProfileRepository::new(&settings.profiles_path, &settings.secrets_path);

  match cli.command {
    Cmd::List => list(&repo).await,
    Cmd::Add { email, name, api_key, server_url, refresh_token, plan } => {
      let profile = CredentialProfile::create(NewProfile {
        email,
        display_name: name,
        api_key,
        api_server_url: server_url,
        refresh_token,
        plan,
      });
      repo.save(&profile).await.context("saving profile")?;
      println!("{}", profile.id);
      Ok(())
    }
    Cmd::Remove { id } => {
      if !repo.remove(&id).await.context("removing profile")? {
        bail!("no profile with id {id}");
      }
      Ok(())
    }
    Cmd::Switch { id } => switch(&settings, &repo, &id).await,
    Cmd::Backup => {
      let store = KvStore::new(settings.paths()?.state_db);
      let path = store.backup().await.context("backup failed")?;
      println!("{}", path.display());
      Ok(())
    }
    Cmd::Inspect { pattern } => inspect(&settings, &pattern).await,
    Cmd::ResetIdentity => {
      let ids = orchestrator(&settings)?.reset_identity().await?;
      println!("{}", serde_json::to_string_pretty(&ids)?);
      Ok(())
    }
  }
}

fn orchestrator(settings: &Settings) -> anyhow::Result<Orchestrator> {
  let paths = settings.paths()?;
  let persister = IdentityPersister::at(&paths.storage_json).with_policy(RetryPolicy {
    attempts:   3,
    base_delay: Duration::from_millis(settings.retry_base_delay_ms),
  });
  let host = Host {
    patch:    CommandPatch(ExternalCommand::new("patch", settings.patch_command.clone())),
    logout:   CommandLogout(ExternalCommand::new("logout", settings.logout_command.clone())),
    injector: CommandInjector(ExternalCommand::new("inject", settings.inject_command.clone())),
    reload:   DeferredReload::new(ExternalCommand::new(
      "reload",
      settings.reload_command.clone(),
    )),
  };
  Ok(
    SwitchOrchestrator::new(KvStore::new(&paths.state_db), persister, host)
      .with_reload_delay(Duration::from_millis(settings.reload_delay_ms)),
  )
}

async fn list(repo: &FileProfileRepository) -> anyhow::Result<()> {
  let profiles = repo.list().await.context("listing profiles")?;
  if profiles.is_empty() {
    println!("no profiles saved");
  }
  for p in profiles {
    println!(
      "{}  {:<32} {:<20} {:<8} {}",
      p.id,
      p.email,
      p.display_name,
      p.plan,
      p.updated_at.format("%Y-%m-%d %H:%M")
    );
  }
  Ok(())
}

async fn switch(settings: &Settings, repo: &FileProfileRepository, id: &str) -> anyhow::Result<()> {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let switcher = orchestrator(settings)?.with_observer(tx);

  let outcome = switcher.switch_profile(repo, id).await;
  switcher.host().reload.run_pending().await;

  rx.close();
  while let Ok(event) = rx.try_recv() {
    println!("{event}");
  }

  if outcome.needs_restart {
    println!("patch applied; the host is restarting, run the switch again afterwards");
    return Ok(());
  }
  match outcome.error {
    None if outcome.success => {
      println!("switched to {id}");
      Ok(())
    }
    error => bail!("switch failed: {}", error.unwrap_or_default()),
  }
}

async fn inspect(settings: &Settings, pattern: &str) -> anyhow::Result<()> {
  let store = KvStore::new(settings.paths()?.state_db);
  for key in store.keys(pattern).await {
    let shown = match store.read(&key).await {
      Some(StoreValue::Json(v)) => v.to_string(),
      Some(StoreValue::Text(s)) => s,
      Some(StoreValue::Bytes(b)) => format!("<{} bytes>", b.len()),
      None => "<unreadable>".to_owned(),
    };
    println!("{key} = {}", truncate(&shown, 120));
  }
  Ok(())
}

fn truncate(s: &str, max: usize) -> String {
  match s.char_indices().nth(max) {
    Some((i, _)) => format!("{}…", &s[..i]),
    None => s.to_owned(),
  }
}
