//! Runtime configuration, read from a TOML file with `SWAPKEY_*` environment
//! overrides.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use swapkey_switch::SwitchPaths;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// Host application name; selects the platform default paths.
  #[serde(default = "default_app_name")]
  pub app_name:            String,
  pub state_db:            Option<PathBuf>,
  pub storage_json:        Option<PathBuf>,
  #[serde(default = "default_profiles_path")]
  pub profiles_path:       PathBuf,
  #[serde(default = "default_secrets_path")]
  pub secrets_path:        PathBuf,
  /// Program (plus arguments) that hands credentials to the running host.
  pub inject_command:      Option<Vec<String>>,
  pub logout_command:      Option<Vec<String>>,
  pub patch_command:       Option<Vec<String>>,
  pub reload_command:      Option<Vec<String>>,
  #[serde(default = "default_reload_delay_ms")]
  pub reload_delay_ms:     u64,
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
}

fn default_app_name() -> String { "Windsurf".to_owned() }

fn default_profiles_path() -> PathBuf { PathBuf::from("~/.config/swapkey/profiles.json") }

fn default_secrets_path() -> PathBuf { PathBuf::from("~/.config/swapkey/secrets.json") }

fn default_reload_delay_ms() -> u64 { 1500 }

fn default_retry_base_delay_ms() -> u64 { 100 }

impl Settings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let raw = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("SWAPKEY"))
      .build()
      .context("failed to read config file")?;

    let mut settings: Settings = raw
      .try_deserialize()
      .context("failed to deserialise Settings")?;

    settings.profiles_path = expand_tilde(&settings.profiles_path);
    settings.secrets_path = expand_tilde(&settings.secrets_path);
    settings.state_db = settings.state_db.as_deref().map(expand_tilde);
    settings.storage_json = settings.storage_json.as_deref().map(expand_tilde);
    Ok(settings)
  }

  /// Resolve host paths once; explicit settings win over platform defaults.
  pub fn paths(&self) -> anyhow::Result<SwitchPaths> {
    let paths = match SwitchPaths::resolve(&self.app_name) {
      Ok(paths) => paths.with_overrides(self.state_db.clone(), self.storage_json.clone()),
      Err(e) => match (&self.state_db, &self.storage_json) {
        (Some(db), Some(json)) => SwitchPaths::new(db, json),
        _ => return Err(e).context("set state_db and storage_json explicitly"),
      },
    };
    Ok(paths)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
