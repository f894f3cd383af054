//! Locations of the host's state database and side identity document.
//!
//! Resolved once at startup and passed to every component that needs them.

use std::{ffi::OsString, path::PathBuf};

use crate::{Error, Result};

pub const STATE_DB_FILE: &str = "state.vscdb";
pub const STORAGE_JSON_FILE: &str = "storage.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchPaths {
  pub state_db:     PathBuf,
  pub storage_json: PathBuf,
}

impl SwitchPaths {
  pub fn new(state_db: impl Into<PathBuf>, storage_json: impl Into<PathBuf>) -> Self {
    Self { state_db: state_db.into(), storage_json: storage_json.into() }
  }

  /// Platform default locations for the host named `app_name`.
  pub fn resolve(app_name: &str) -> Result<Self> {
    Self::resolve_with(app_name, |var| std::env::var_os(var))
  }

  fn resolve_with(
    app_name: &str,
    env: impl Fn(&str) -> Option<OsString>,
  ) -> Result<Self> {
    let dir = global_storage_dir(app_name, &env)?;
    Ok(Self {
      state_db:     dir.join(STATE_DB_FILE),
      storage_json: dir.join(STORAGE_JSON_FILE),
    })
  }

  /// Replace whichever paths were configured explicitly.
  pub fn with_overrides(
    mut self,
    state_db: Option<PathBuf>,
    storage_json: Option<PathBuf>,
  ) -> Self {
    if let Some(p) = state_db {
      self.state_db = p;
    }
    if let Some(p) = storage_json {
      self.storage_json = p;
    }
    self
  }
}

fn global_storage_dir(
  app_name: &str,
  env: &impl Fn(&str) -> Option<OsString>,
) -> Result<PathBuf> {
  let config_root = if cfg!(windows) {
    PathBuf::from(env("APPDATA").ok_or(Error::MissingEnv("APPDATA"))?)
  } else if cfg!(target_os = "macos") {
    PathBuf::from(env("HOME").ok_or(Error::MissingEnv("HOME"))?)
      .join("Library")
      .join("Application Support")
  } else if let Some(xdg) = env("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
    PathBuf::from(xdg)
  } else {
    PathBuf::from(env("HOME").ok_or(Error::MissingEnv("HOME"))?).join(".config")
  };

  Ok(config_root.join(app_name).join("User").join("globalStorage"))
}
