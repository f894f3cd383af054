//! Machine identifiers rewritten on every switch.

use serde::{Deserialize, Serialize};

/// A freshly generated set of device identifiers.
///
/// No history is kept: each set fully supersedes the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineIdentitySet {
  /// SHA-256 digest, 64 lowercase hex characters.
  pub machine_id:         String,
  /// SHA-512 digest, 128 lowercase hex characters.
  pub mac_machine_id:     String,
  /// `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`, uppercase.
  pub sqm_id:             String,
  pub dev_device_id:      String,
  pub service_machine_id: String,
}
