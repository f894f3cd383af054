//! File-backed [`ProfileRepository`].
//!
//! Profiles live in one JSON file with their secrets blanked; API keys and
//! refresh tokens live in a second file keyed by profile id, readable only by
//! the owner on Unix.

use std::{
  collections::BTreeMap,
  io,
  path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use swapkey_core::{
  host::ProfileRepository,
  profile::{CredentialProfile, ProfileSecrets},
};
use thiserror::Error;
use tokio::io::AsyncWriteExt as _;

#[derive(Debug, Error)]
pub enum ProfileStoreError {
  #[error("io error on {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("malformed {path}: {source}")]
  Json {
    path:   PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

type Secrets = BTreeMap<String, ProfileSecrets>;

pub struct FileProfileRepository {
  profiles_path: PathBuf,
  secrets_path:  PathBuf,
}

impl FileProfileRepository {
  pub fn new(profiles_path: impl Into<PathBuf>, secrets_path: impl Into<PathBuf>) -> Self {
    Self { profiles_path: profiles_path.into(), secrets_path: secrets_path.into() }
  }

  async fn records(&self) -> Result<Vec<CredentialProfile>, ProfileStoreError> {
    Ok(read_json(&self.profiles_path).await?.unwrap_or_default())
  }

  async fn secrets(&self) -> Result<Secrets, ProfileStoreError> {
    Ok(read_json(&self.secrets_path).await?.unwrap_or_default())
  }

  async fn store(
    &self,
    records: &[CredentialProfile],
    secrets: &Secrets,
  ) -> Result<(), ProfileStoreError> {
    write_json(&self.profiles_path, &records, false).await?;
    write_json(&self.secrets_path, secrets, true).await
  }
}

impl ProfileRepository for FileProfileRepository {
  type Error = ProfileStoreError;

  async fn list(&self) -> Result<Vec<CredentialProfile>, ProfileStoreError> {
    let mut secrets = self.secrets().await?;
    let mut profiles: Vec<CredentialProfile> = self
      .records()
      .await?
      .into_iter()
      .map(|p| {
        let s = secrets.remove(&p.id).unwrap_or_default();
        p.with_secrets(s)
      })
      .collect();
    profiles.sort_by_key(|p| p.created_at);
    Ok(profiles)
  }

  async fn get(&self, id: &str) -> Result<Option<CredentialProfile>, ProfileStoreError> {
    let Some(record) = self.records().await?.into_iter().find(|p| p.id == id) else {
      return Ok(None);
    };
    let secrets = self.secrets().await?.remove(id).unwrap_or_default();
    Ok(Some(record.with_secrets(secrets)))
  }

  async fn save(&self, profile: &CredentialProfile) -> Result<(), ProfileStoreError> {
    let mut records = self.records().await?;
    let mut secrets = self.secrets().await?;
    let (record, secret) = profile.without_secrets();

    match records.iter_mut().find(|p| p.id == record.id) {
      Some(existing) => *existing = record,
      None => records.push(record),
    }
    secrets.insert(profile.id.clone(), secret);

    self.store(&records, &secrets).await
  }

  async fn remove(&self, id: &str) -> Result<bool, ProfileStoreError> {
    let mut records = self.records().await?;
    let mut secrets = self.secrets().await?;

    let before = records.len();
    records.retain(|p| p.id != id);
    let existed = records.len() != before;
    let had_secrets = secrets.remove(id).is_some();

    if existed || had_secrets {
      self.store(&records, &secrets).await?;
    }
    Ok(existed)
  }
}

// ─── File helpers ────────────────────────────────────────────────────────────

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ProfileStoreError> {
  let raw = match tokio::fs::read_to_string(path).await {
    Ok(raw) => raw,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(source) => return Err(ProfileStoreError::Io { path: path.to_path_buf(), source }),
  };
  serde_json::from_str(&raw)
    .map(Some)
    .map_err(|source| ProfileStoreError::Json { path: path.to_path_buf(), source })
}

/// Write `value` as pretty JSON. A `private` file is owner-only before any
/// bytes reach it.
async fn write_json<T: Serialize + ?Sized>(
  path: &Path,
  value: &T,
  private: bool,
) -> Result<(), ProfileStoreError> {
  let io_err = |source| ProfileStoreError::Io { path: path.to_path_buf(), source };
  let body = serde_json::to_string_pretty(value)
    .map_err(|source| ProfileStoreError::Json { path: path.to_path_buf(), source })?;
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
  }

  let mut options = tokio::fs::OpenOptions::new();
  options.write(true).create(true).truncate(true);
  #[cfg(unix)]
  if private {
    options.mode(0o600);
  }
  let mut file = options.open(path).await.map_err(io_err)?;
  if private {
    restrict_permissions(&file).await.map_err(io_err)?;
  }

  file.write_all(body.as_bytes()).await.map_err(io_err)?;
  file.flush().await.map_err(io_err)
}

/// Covers files created before they were opened owner-only.
#[cfg(unix)]
async fn restrict_permissions(file: &tokio::fs::File) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt as _;
  file.set_permissions(std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_file: &tokio::fs::File) -> io::Result<()> { Ok(()) }

#[cfg(test)]
mod tests {
  use swapkey_core::profile::NewProfile;

  use super::*;

  fn repo(dir: &Path) -> FileProfileRepository {
    FileProfileRepository::new(dir.join("profiles.json"), dir.join("secrets.json"))
  }

  fn new_profile(email: &str, key: &str) -> CredentialProfile {
    CredentialProfile::create(NewProfile {
      email:          email.into(),
      display_name:   email.split('@').next().unwrap_or_default().into(),
      api_key:        key.into(),
      api_server_url: None,
      refresh_token:  Some(format!("rt-{key}")),
      plan:           None,
    })
  }

  #[tokio::test]
  async fn empty_repository_lists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    assert!(repo(dir.path()).list().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn secrets_are_stored_apart_and_merged_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let r = repo(dir.path());
    let p = new_profile("ada@example.com", "sk-ada");
    r.save(&p).await.unwrap();

    let on_disk = std::fs::read_to_string(dir.path().join("profiles.json")).unwrap();
    assert!(!on_disk.contains("sk-ada"));
    assert!(!on_disk.contains("rt-sk-ada"));

    assert_eq!(r.get(&p.id).await.unwrap(), Some(p.clone()));
    assert_eq!(r.list().await.unwrap(), vec![p]);
  }

  #[tokio::test]
  async fn save_updates_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let r = repo(dir.path());
    let mut p = new_profile("ada@example.com", "sk-1");
    r.save(&p).await.unwrap();

    p.api_key = "sk-2".into();
    p.plan = "Pro".into();
    r.save(&p).await.unwrap();

    let all = r.list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].api_key, "sk-2");
    assert_eq!(all[0].plan, "Pro");
  }

  #[tokio::test]
  async fn remove_purges_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let r = repo(dir.path());
    let keep = new_profile("keep@example.com", "sk-keep");
    let gone = new_profile("gone@example.com", "sk-gone");
    r.save(&keep).await.unwrap();
    r.save(&gone).await.unwrap();

    assert!(r.remove(&gone.id).await.unwrap());
    assert!(!r.remove(&gone.id).await.unwrap());

    let secrets = std::fs::read_to_string(dir.path().join("secrets.json")).unwrap();
    assert!(!secrets.contains("sk-gone"));
    assert!(secrets.contains("sk-keep"));
    assert!(r.get(&gone.id).await.unwrap().is_none());
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn secrets_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt as _;

    let dir = tempfile::tempdir().unwrap();
    let secrets_path = dir.path().join("secrets.json");
    std::fs::write(&secrets_path, "{}").unwrap();
    std::fs::set_permissions(&secrets_path, std::fs::Permissions::from_mode(0o644)).unwrap();

    repo(dir.path()).save(&new_profile("ada@example.com", "sk-ada")).await.unwrap();

    let mode = std::fs::metadata(&secrets_path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert!(std::fs::read_to_string(&secrets_path).unwrap().contains("sk-ada"));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn fresh_secrets_file_is_created_owner_only() {
    use std::os::unix::fs::PermissionsExt as _;

    let dir = tempfile::tempdir().unwrap();
    repo(dir.path()).save(&new_profile("ada@example.com", "sk-ada")).await.unwrap();

    let mode = std::fs::metadata(dir.path().join("secrets.json")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
  }
}
