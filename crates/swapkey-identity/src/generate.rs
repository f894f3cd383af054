//! Fresh device identifiers from the OS random source.

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256, Sha512};
use swapkey_core::identity::MachineIdentitySet;
use uuid::Uuid;

/// Generate a new identity set. Every call draws fresh randomness.
pub fn generate() -> MachineIdentitySet {
  MachineIdentitySet {
    machine_id:         hex::encode(Sha256::digest(random_bytes::<32>())),
    mac_machine_id:     hex::encode(Sha512::digest(random_bytes::<64>())),
    sqm_id:             format!("{{{}}}", Uuid::new_v4().hyphenated().to_string().to_uppercase()),
    dev_device_id:      Uuid::new_v4().to_string(),
    service_machine_id: Uuid::new_v4().to_string(),
  }
}

fn random_bytes<const N: usize>() -> [u8; N] {
  let mut buf = [0u8; N];
  OsRng.fill_bytes(&mut buf);
  buf
}

#[cfg(test)]
mod tests {
  use super::*;

  fn is_lower_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
  }

  #[test]
  fn digests_have_expected_shape() {
    let ids = generate();
    assert_eq!(ids.machine_id.len(), 64);
    assert_eq!(ids.mac_machine_id.len(), 128);
    assert!(is_lower_hex(&ids.machine_id));
    assert!(is_lower_hex(&ids.mac_machine_id));
  }

  #[test]
  fn sqm_id_is_braced_uppercase_uuid() {
    let ids = generate();
    let inner = ids
      .sqm_id
      .strip_prefix('{')
      .and_then(|s| s.strip_suffix('}'))
      .expect("braces");
    assert!(Uuid::parse_str(inner).is_ok());
    assert_eq!(inner, inner.to_uppercase());
    assert_eq!(inner.len(), 36);
  }

  #[test]
  fn plain_ids_are_uuids() {
    let ids = generate();
    assert!(Uuid::parse_str(&ids.dev_device_id).is_ok());
    assert!(Uuid::parse_str(&ids.service_machine_id).is_ok());
  }

  #[test]
  fn successive_calls_differ() {
    let a = generate();
    let b = generate();
    assert_ne!(a.machine_id, b.machine_id);
    assert_ne!(a.mac_machine_id, b.mac_machine_id);
    assert_ne!(a.sqm_id, b.sqm_id);
    assert_ne!(a.dev_device_id, b.dev_device_id);
  }
}
