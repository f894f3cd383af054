//! Records written into the host's key-value table to mark the active
//! account.
//!
//! Each record lives under a fixed key and is overwritten on every switch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::CredentialProfile;

// ─── Keys ────────────────────────────────────────────────────────────────────

pub const AUTH_STATUS_KEY: &str = "authStatus";
pub const SERVICE_CONFIG_KEY: &str = "serviceConfig";
pub const DISPLAY_NAME_KEY: &str = "displayName";
pub const SERVICE_MACHINE_ID_KEY: &str = "storage.serviceMachineId";

// ─── Records ─────────────────────────────────────────────────────────────────

/// Who is currently signed in, as the host reads it on startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusSnapshot {
  pub name:       String,
  pub api_key:    String,
  pub email:      String,
  /// Regenerated on every write.
  pub session_id: String,
  pub plan:       String,
}

/// Bundle of installation id, API key and server URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfigRecord {
  pub installation_id: String,
  pub api_key:         String,
  pub api_server_url:  String,
}

impl AuthStatusSnapshot {
  pub fn for_profile(profile: &CredentialProfile) -> Self {
    Self {
      name:       profile.display_name.clone(),
      api_key:    profile.api_key.clone(),
      email:      profile.email.clone(),
      session_id: Uuid::new_v4().to_string(),
      plan:       profile.plan.clone(),
    }
  }
}

impl ServiceConfigRecord {
  pub fn for_profile(profile: &CredentialProfile) -> Self {
    Self {
      installation_id: Uuid::new_v4().to_string(),
      api_key:         profile.api_key.clone(),
      api_server_url:  profile.api_server_url.clone(),
    }
  }
}
