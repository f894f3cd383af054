//! Credential profiles: one saved account per profile.
//!
//! The API key and refresh token belong to a separate secret store. A
//! repository persists [`CredentialProfile::without_secrets`] and fills the
//! secrets back in when a profile is handed to the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server used when a profile does not carry its own.
pub const DEFAULT_API_SERVER_URL: &str = "https://server.codeium.com";

/// Secret half of a profile, stored apart from the profile record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSecrets {
  pub api_key:       String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub refresh_token: Option<String>,
}

/// One saved account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialProfile {
  pub id:             String,
  pub email:          String,
  pub display_name:   String,
  /// Empty at rest; populated only on in-memory copies.
  #[serde(default)]
  pub api_key:        String,
  pub api_server_url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub refresh_token:  Option<String>,
  #[serde(default)]
  pub plan:           String,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Fields supplied by a successful login.
#[derive(Debug, Clone)]
pub struct NewProfile {
  pub email:          String,
  pub display_name:   String,
  pub api_key:        String,
  pub api_server_url: Option<String>,
  pub refresh_token:  Option<String>,
  pub plan:           Option<String>,
}

impl CredentialProfile {
  /// Build a fresh profile with a new id and both timestamps set to now.
  pub fn create(input: NewProfile) -> Self {
    let now = Utc::now();
    Self {
      id:             Uuid::new_v4().to_string(),
      email:          input.email,
      display_name:   input.display_name,
      api_key:        input.api_key,
      api_server_url: input
        .api_server_url
        .unwrap_or_else(|| DEFAULT_API_SERVER_URL.to_owned()),
      refresh_token:  input.refresh_token,
      plan:           input.plan.unwrap_or_else(|| "Free".to_owned()),
      created_at:     now,
      updated_at:     now,
    }
  }

  /// Split into the at-rest record and its secrets.
  pub fn without_secrets(&self) -> (Self, ProfileSecrets) {
    let secrets = ProfileSecrets {
      api_key:       self.api_key.clone(),
      refresh_token: self.refresh_token.clone(),
    };
    let record = Self {
      api_key: String::new(),
      refresh_token: None,
      ..self.clone()
    };
    (record, secrets)
  }

  /// Attach secrets to an at-rest record.
  pub fn with_secrets(mut self, secrets: ProfileSecrets) -> Self {
    self.api_key = secrets.api_key;
    self.refresh_token = secrets.refresh_token;
    self
  }
}
