//! The orchestrator's return contract.

use serde::{Deserialize, Serialize};

/// Result of one switch attempt. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchOutcome {
  pub success:       bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:         Option<String>,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub needs_restart: bool,
}

impl SwitchOutcome {
  pub fn succeeded() -> Self {
    Self { success: true, ..Self::default() }
  }

  pub fn failed(error: impl Into<String>) -> Self {
    Self { success: false, error: Some(error.into()), needs_restart: false }
  }

  pub fn restart_required() -> Self {
    Self { success: false, error: None, needs_restart: true }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn serializes_only_present_fields() {
    let ok = serde_json::to_value(SwitchOutcome::succeeded()).unwrap();
    assert_eq!(ok, serde_json::json!({ "success": true }));

    let restart = serde_json::to_value(SwitchOutcome::restart_required()).unwrap();
    assert_eq!(
      restart,
      serde_json::json!({ "success": false, "needsRestart": true })
    );
  }
}
