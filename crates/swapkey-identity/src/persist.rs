//! Merge a [`MachineIdentitySet`] into the host's side JSON document.
//!
//! Only the identity fields are touched; every other key in the document is
//! preserved. The host may hold the file briefly while it writes its own
//! state, so writes are retried with a linearly growing delay.

use std::{future::Future, io, path::PathBuf, time::Duration};

use serde_json::{Map, Value};
use swapkey_core::identity::MachineIdentitySet;
use tracing::{debug, warn};

use crate::{Error, Result};

pub const MACHINE_ID_FIELD: &str = "telemetry.machineId";
pub const MAC_MACHINE_ID_FIELD: &str = "telemetry.macMachineId";
pub const DEV_DEVICE_ID_FIELD: &str = "telemetry.devDeviceId";
/// Only written where the host reads it (Windows).
pub const SQM_ID_FIELD: &str = "telemetry.sqmId";

// ─── Document I/O ────────────────────────────────────────────────────────────

/// Raw access to the side document.
pub trait DocumentIo: Send + Sync {
  /// Current contents, or `None` if the document does not exist.
  fn read(&self) -> impl Future<Output = io::Result<Option<String>>> + Send + '_;

  fn write<'a>(&'a self, contents: &'a str)
  -> impl Future<Output = io::Result<()>> + Send + 'a;
}

/// The side document on disk.
#[derive(Debug, Clone)]
pub struct FsDocument {
  path: PathBuf,
}

impl FsDocument {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl DocumentIo for FsDocument {
  async fn read(&self) -> io::Result<Option<String>> {
    match tokio::fs::read_to_string(&self.path).await {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e),
    }
  }

  async fn write(&self, contents: &str) -> io::Result<()> {
    if let Some(parent) = self.path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&self.path, contents).await
  }
}

// ─── Retry ───────────────────────────────────────────────────────────────────

/// Attempt `n` (1-based) that fails waits `base_delay * n` before the next.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub attempts:   u32,
  pub base_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { attempts: 3, base_delay: Duration::from_millis(100) }
  }
}

// ─── Persister ───────────────────────────────────────────────────────────────

pub struct IdentityPersister<D = FsDocument> {
  doc:            D,
  policy:         RetryPolicy,
  include_sqm_id: bool,
}

impl IdentityPersister<FsDocument> {
  /// Persister for the document at `path` using the current platform's
  /// field set.
  pub fn at(path: impl Into<PathBuf>) -> Self {
    Self::new(FsDocument::new(path))
  }
}

impl<D: DocumentIo> IdentityPersister<D> {
  pub fn new(doc: D) -> Self {
    Self {
      doc,
      policy: RetryPolicy::default(),
      include_sqm_id: cfg!(windows),
    }
  }

  pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Force the platform-conditional field on or off.
  pub fn with_sqm_id(mut self, include: bool) -> Self {
    self.include_sqm_id = include;
    self
  }

  /// Write `ids` into the document, keeping every unrelated key.
  ///
  /// A missing or unparsable document is treated as empty.
  pub async fn persist(&self, ids: &MachineIdentitySet) -> Result<MachineIdentitySet> {
    let mut doc = self.load().await;

    doc.insert(MACHINE_ID_FIELD.into(), Value::String(ids.machine_id.clone()));
    doc.insert(MAC_MACHINE_ID_FIELD.into(), Value::String(ids.mac_machine_id.clone()));
    doc.insert(DEV_DEVICE_ID_FIELD.into(), Value::String(ids.dev_device_id.clone()));
    if self.include_sqm_id {
      doc.insert(SQM_ID_FIELD.into(), Value::String(ids.sqm_id.clone()));
    }

    let contents = serde_json::to_string_pretty(&Value::Object(doc))?;
    self.write_with_retry(&contents).await?;
    Ok(ids.clone())
  }

  async fn load(&self) -> Map<String, Value> {
    let raw = match self.doc.read().await {
      Ok(Some(raw)) => raw,
      Ok(None) => return Map::new(),
      Err(e) => {
        warn!(error = %e, "identity document unreadable, starting empty");
        return Map::new();
      }
    };

    match serde_json::from_str::<Value>(&raw) {
      Ok(Value::Object(map)) => map,
      Ok(_) | Err(_) => {
        warn!("identity document is not a JSON object, starting empty");
        Map::new()
      }
    }
  }

  async fn write_with_retry(&self, contents: &str) -> Result<()> {
    let attempts = self.policy.attempts.max(1);
    let mut attempt = 1;
    loop {
      match self.doc.write(contents).await {
        Ok(()) => {
          debug!(attempt, "identity document written");
          return Ok(());
        }
        Err(e) if attempt < attempts => {
          warn!(attempt, error = %e, "identity document write failed, retrying");
          tokio::time::sleep(self.policy.base_delay * attempt).await;
          attempt += 1;
        }
        Err(e) => return Err(Error::RetryExhausted { attempts: attempt, source: e }),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      Mutex,
      atomic::{AtomicU32, Ordering},
    },
    time::Instant,
  };

  use serde_json::json;

  use super::*;
  use crate::generate;

  /// In-memory document whose first `failures` writes fail.
  struct FlakyDocument {
    contents: Mutex<Option<String>>,
    failures: AtomicU32,
    writes:   AtomicU32,
    attempts: Mutex<Vec<Instant>>,
  }

  impl FlakyDocument {
    fn new(contents: Option<&str>, failures: u32) -> Self {
      Self {
        contents: Mutex::new(contents.map(str::to_owned)),
        failures: AtomicU32::new(failures),
        writes:   AtomicU32::new(0),
        attempts: Mutex::new(Vec::new()),
      }
    }

    fn json(&self) -> Value {
      let raw = self.contents.lock().unwrap().clone().expect("written");
      serde_json::from_str(&raw).unwrap()
    }
  }

  impl DocumentIo for FlakyDocument {
    async fn read(&self) -> io::Result<Option<String>> {
      Ok(self.contents.lock().unwrap().clone())
    }

    async fn write(&self, contents: &str) -> io::Result<()> {
      self.writes.fetch_add(1, Ordering::SeqCst);
      self.attempts.lock().unwrap().push(Instant::now());
      let remaining = self.failures.load(Ordering::SeqCst);
      if remaining > 0 {
        self.failures.store(remaining - 1, Ordering::SeqCst);
        return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
      }
      *self.contents.lock().unwrap() = Some(contents.to_owned());
      Ok(())
    }
  }

  fn fast() -> RetryPolicy {
    RetryPolicy { attempts: 3, base_delay: Duration::from_millis(1) }
  }

  #[tokio::test]
  async fn preserves_unrelated_keys() {
    let doc = FlakyDocument::new(
      Some(r#"{"theme":"dark","telemetry.machineId":"old"}"#),
      0,
    );
    let persister = IdentityPersister::new(doc).with_sqm_id(false);
    let ids = generate();

    persister.persist(&ids).await.unwrap();

    let written = persister.doc.json();
    assert_eq!(written["theme"], json!("dark"));
    assert_eq!(written[MACHINE_ID_FIELD], json!(ids.machine_id));
    assert_eq!(written[MAC_MACHINE_ID_FIELD], json!(ids.mac_machine_id));
    assert_eq!(written[DEV_DEVICE_ID_FIELD], json!(ids.dev_device_id));
    assert!(written.get(SQM_ID_FIELD).is_none());
  }

  #[tokio::test]
  async fn sqm_id_written_when_enabled() {
    let persister = IdentityPersister::new(FlakyDocument::new(None, 0)).with_sqm_id(true);
    let ids = generate();
    persister.persist(&ids).await.unwrap();
    assert_eq!(persister.doc.json()[SQM_ID_FIELD], json!(ids.sqm_id));
  }

  #[tokio::test]
  async fn unparsable_document_starts_empty() {
    let persister =
      IdentityPersister::new(FlakyDocument::new(Some("{{ not json"), 0)).with_sqm_id(false);
    let ids = generate();
    persister.persist(&ids).await.unwrap();

    let written = persister.doc.json();
    assert_eq!(written.as_object().unwrap().len(), 3);
  }

  #[tokio::test]
  async fn succeeds_on_third_attempt() {
    let persister = IdentityPersister::new(FlakyDocument::new(None, 2)).with_policy(fast());
    let ids = generate();

    let returned = persister.persist(&ids).await.unwrap();

    assert_eq!(returned, ids);
    assert_eq!(persister.doc.writes.load(Ordering::SeqCst), 3);
    assert_eq!(persister.doc.json()[MACHINE_ID_FIELD], json!(ids.machine_id));
  }

  #[tokio::test]
  async fn surfaces_error_after_three_failures() {
    let persister = IdentityPersister::new(FlakyDocument::new(None, 3)).with_policy(fast());

    let err = persister.persist(&generate()).await.unwrap_err();

    assert_eq!(persister.doc.writes.load(Ordering::SeqCst), 3);
    match err {
      Error::RetryExhausted { attempts, source } => {
        assert_eq!(attempts, 3);
        assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn retry_delay_grows_with_attempt_number() {
    let base = Duration::from_millis(20);
    let persister = IdentityPersister::new(FlakyDocument::new(None, 2))
      .with_policy(RetryPolicy { attempts: 3, base_delay: base });

    persister.persist(&generate()).await.unwrap();

    let stamps = persister.doc.attempts.lock().unwrap().clone();
    assert_eq!(stamps.len(), 3);
    let first_gap = stamps[1] - stamps[0];
    let second_gap = stamps[2] - stamps[1];
    assert!(first_gap >= base, "first retry waited {first_gap:?}");
    assert!(second_gap >= base * 2, "second retry waited {second_gap:?}");
  }

  #[tokio::test]
  async fn writes_a_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("globalStorage").join("storage.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{"window.zoom": 1}"#).unwrap();

    let ids = generate();
    IdentityPersister::at(&path).persist(&ids).await.unwrap();

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["window.zoom"], json!(1));
    assert_eq!(written[MACHINE_ID_FIELD], json!(ids.machine_id));
  }
}
