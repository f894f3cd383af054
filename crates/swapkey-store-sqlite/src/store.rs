//! [`KvStore`]: full-image read-mutate-write access to `ItemTable`.

use std::{
  io,
  path::{Path, PathBuf},
};

use chrono::Utc;
use rusqlite::{DatabaseName, OptionalExtension as _, backup::Progress, types::ValueRef};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  encode::{StoreValue, decode_value, encode_value},
  schema::SCHEMA,
};

// ─── Image ───────────────────────────────────────────────────────────────────

/// The whole database loaded into an in-memory connection.
///
/// Dropping the image closes the connection, so it is released on every exit
/// path of the operation that loaded it.
struct Image {
  conn: tokio_rusqlite::Connection,
}

impl Image {
  /// Copy the file at `path` into a fresh in-memory database.
  async fn load(path: &Path) -> Result<Self> {
    if !tokio::fs::try_exists(path).await? {
      return Err(Error::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("state database not found at {}", path.display()),
      )));
    }

    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let src = path.to_path_buf();
    conn
      .call(move |conn| {
        conn.restore(DatabaseName::Main, &src, None::<fn(Progress)>)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;

    Ok(Self { conn })
  }

  /// Overwrite the file at `path` with the current in-memory image.
  async fn export(&self, path: &Path) -> Result<()> {
    let dst = path.to_path_buf();
    self
      .conn
      .call(move |conn| {
        conn.backup(DatabaseName::Main, &dst, None)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Key-value access to the host's state database at a fixed path.
///
/// No lock is taken on the file. A cycle started here can race with the host
/// writing the same file; the last writer wins. Call [`KvStore::backup`]
/// before risky sequences.
#[derive(Debug, Clone)]
pub struct KvStore {
  path: PathBuf,
}

impl KvStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path { &self.path }

  /// Create an empty database holding just the key-value table.
  pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
    let store = Self::new(path);
    let conn = tokio_rusqlite::Connection::open(&store.path).await?;
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(store)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Look up `key`. Every failure collapses to `None`.
  pub async fn read(&self, key: &str) -> Option<StoreValue> {
    match self.read_raw(key).await {
      Ok(raw) => raw.map(decode_value),
      Err(e) => {
        debug!(key, error = %e, "kv read failed");
        None
      }
    }
  }

  async fn read_raw(&self, key: &str) -> Result<Option<String>> {
    let image = Image::load(&self.path).await?;
    let key = key.to_owned();

    let raw = image
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM ItemTable WHERE key = ?1",
              rusqlite::params![key],
              |row| Ok(value_text(row.get_ref(0)?)),
            )
            .optional()?
            .flatten(),
        )
      })
      .await?;

    Ok(raw)
  }

  /// Keys matching a SQL `LIKE` pattern. Best-effort, like [`KvStore::read`].
  pub async fn keys(&self, pattern: &str) -> Vec<String> {
    self.try_keys(pattern).await.unwrap_or_else(|e| {
      debug!(pattern, error = %e, "kv key scan failed");
      Vec::new()
    })
  }

  async fn try_keys(&self, pattern: &str) -> Result<Vec<String>> {
    let image = Image::load(&self.path).await?;
    let pattern = pattern.to_owned();
    let keys = image
      .conn
      .call(move |conn| Ok(matching_keys(conn, &pattern)?))
      .await?;
    Ok(keys)
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Upsert `key` and rewrite the file. Load and export failures propagate.
  pub async fn write(&self, key: &str, value: impl Into<StoreValue>) -> Result<()> {
    let encoded = encode_value(key, &value.into())?;
    let image = Image::load(&self.path).await?;

    let key_owned = key.to_owned();
    image
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?1, ?2)",
          rusqlite::params![key_owned, encoded],
        )?;
        Ok(())
      })
      .await?;

    image.export(&self.path).await?;
    debug!(key, path = %self.path.display(), "kv write");
    Ok(())
  }

  /// Remove `key` and rewrite the file.
  ///
  /// Returns whether the rewrite succeeded, not whether the key existed.
  pub async fn delete(&self, key: &str) -> bool {
    match self.try_delete(key).await {
      Ok(()) => true,
      Err(e) => {
        warn!(key, error = %e, "kv delete failed");
        false
      }
    }
  }

  async fn try_delete(&self, key: &str) -> Result<()> {
    let image = Image::load(&self.path).await?;
    let key = key.to_owned();
    image
      .conn
      .call(move |conn| {
        conn.execute("DELETE FROM ItemTable WHERE key = ?1", rusqlite::params![key])?;
        Ok(())
      })
      .await?;
    image.export(&self.path).await
  }

  /// Remove every key matching a SQL `LIKE` pattern with a single rewrite.
  /// Returns the number of rows removed.
  pub async fn delete_by_pattern(&self, pattern: &str) -> Result<usize> {
    let image = Image::load(&self.path).await?;
    let pattern_owned = pattern.to_owned();

    let removed = image
      .conn
      .call(move |conn| {
        let keys = matching_keys(conn, &pattern_owned)?;
        let mut removed = 0;
        for key in &keys {
          removed +=
            conn.execute("DELETE FROM ItemTable WHERE key = ?1", rusqlite::params![key])?;
        }
        Ok(removed)
      })
      .await?;

    if removed > 0 {
      image.export(&self.path).await?;
    }
    debug!(pattern, removed, "kv pattern delete");
    Ok(removed)
  }

  // ── Backup ────────────────────────────────────────────────────────────────

  /// Copy the database to `<path>.backup.<epoch-millis>`. An existing backup
  /// is never overwritten; a name taken in the same millisecond gets a
  /// numeric suffix.
  pub async fn backup(&self) -> Option<PathBuf> {
    match self.try_backup().await {
      Ok(target) => Some(target),
      Err(e) => {
        warn!(path = %self.path.display(), error = %e, "kv backup failed");
        None
      }
    }
  }

  async fn try_backup(&self) -> Result<PathBuf> {
    tokio::fs::metadata(&self.path).await?;
    let target = reserve_backup_target(&self.path, Utc::now().timestamp_millis()).await?;
    if let Err(e) = tokio::fs::copy(&self.path, &target).await {
      let _ = tokio::fs::remove_file(&target).await;
      return Err(e.into());
    }
    debug!(backup = %target.display(), "kv backup");
    Ok(target)
  }
}

/// Create an empty file at the first free `<path>.backup.<stamp>[.<n>]`.
pub(crate) async fn reserve_backup_target(path: &Path, stamp: i64) -> io::Result<PathBuf> {
  let mut suffix = 0u32;
  loop {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".backup.{stamp}"));
    if suffix > 0 {
      name.push(format!(".{suffix}"));
    }
    let target = PathBuf::from(name);

    match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&target).await {
      Ok(_) => return Ok(target),
      Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
      Err(e) => return Err(e),
    }
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// The host writes values as TEXT or BLOB depending on its version.
fn value_text(value: ValueRef<'_>) -> Option<String> {
  match value {
    ValueRef::Text(b) | ValueRef::Blob(b) => {
      Some(String::from_utf8_lossy(b).into_owned())
    }
    ValueRef::Integer(i) => Some(i.to_string()),
    ValueRef::Real(f) => Some(f.to_string()),
    ValueRef::Null => None,
  }
}

fn matching_keys(
  conn: &rusqlite::Connection,
  pattern: &str,
) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare("SELECT key FROM ItemTable WHERE key LIKE ?1")?;
  stmt
    .query_map(rusqlite::params![pattern], |row| row.get(0))?
    .collect()
}
