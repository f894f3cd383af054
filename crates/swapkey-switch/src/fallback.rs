//! Direct write of the active-account records into the state database.
//!
//! Used as the fallback when live injection is unavailable, and as a
//! best-effort backstop after a successful injection.

use serde_json::to_value;
use swapkey_core::{
  profile::CredentialProfile,
  snapshot::{
    AUTH_STATUS_KEY, AuthStatusSnapshot, DISPLAY_NAME_KEY, SERVICE_CONFIG_KEY,
    ServiceConfigRecord,
  },
};
use swapkey_store_sqlite::KvStore;
use tracing::debug;

use crate::Result;

/// Write the auth snapshot, the service config bundle and the display name.
///
/// All three must land; the first failure is returned.
pub async fn write_active_account(store: &KvStore, profile: &CredentialProfile) -> Result<()> {
  let snapshot = AuthStatusSnapshot::for_profile(profile);
  store.write(AUTH_STATUS_KEY, to_value(&snapshot)?).await?;

  let config = ServiceConfigRecord::for_profile(profile);
  store.write(SERVICE_CONFIG_KEY, to_value(&config)?).await?;

  store.write(DISPLAY_NAME_KEY, profile.display_name.as_str()).await?;

  debug!(profile = %profile.id, session_id = %snapshot.session_id, "active account written");
  Ok(())
}
