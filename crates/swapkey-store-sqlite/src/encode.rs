//! Conversion between [`StoreValue`] and the text stored in `ItemTable.value`.
//!
//! Structured values are stored as compact JSON. Byte payloads are stored as
//! `{"kind":"bytes","data":[..]}` because the column is read as text. Plain
//! text is stored verbatim unless it would itself parse as JSON, in which case
//! it is stored as a JSON string literal so it reads back as the same text.

use serde_json::{Value, json};

use crate::{Error, Result};

const BYTES_KIND: &str = "bytes";

/// A value held under one key.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
  /// Any JSON structure except a bare string (see [`StoreValue::from`]).
  Json(Value),
  Text(String),
  Bytes(Vec<u8>),
}

impl StoreValue {
  pub fn as_json(&self) -> Option<&Value> {
    match self {
      Self::Json(v) => Some(v),
      _ => None,
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_bytes(&self) -> Option<&[u8]> {
    match self {
      Self::Bytes(b) => Some(b),
      _ => None,
    }
  }
}

/// JSON strings are canonicalised to [`StoreValue::Text`].
impl From<Value> for StoreValue {
  fn from(value: Value) -> Self {
    match value {
      Value::String(s) => Self::Text(s),
      other => Self::Json(other),
    }
  }
}

impl From<String> for StoreValue {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<&str> for StoreValue {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<Vec<u8>> for StoreValue {
  fn from(b: Vec<u8>) -> Self { Self::Bytes(b) }
}

// ─── Encode ──────────────────────────────────────────────────────────────────

/// Encode `value` for storage under `key`.
///
/// `null` is rejected, as is a JSON object already in the byte-payload form:
/// it would read back as [`StoreValue::Bytes`].
pub fn encode_value(key: &str, value: &StoreValue) -> Result<String> {
  let invalid = |reason| Error::InvalidValue { key: key.to_owned(), reason };
  match value {
    StoreValue::Json(Value::Null) => Err(invalid("null")),
    StoreValue::Json(v) if decode_bytes(v).is_some() => {
      Err(invalid("object collides with the byte payload encoding"))
    }
    StoreValue::Json(Value::String(s)) | StoreValue::Text(s) => encode_text(s),
    StoreValue::Json(v) => Ok(serde_json::to_string(v)?),
    StoreValue::Bytes(b) => {
      Ok(json!({ "kind": BYTES_KIND, "data": b }).to_string())
    }
  }
}

fn encode_text(s: &str) -> Result<String> {
  if serde_json::from_str::<Value>(s).is_ok() {
    Ok(serde_json::to_string(s)?)
  } else {
    Ok(s.to_owned())
  }
}

// ─── Decode ──────────────────────────────────────────────────────────────────

/// Best-effort decode: text that is not JSON is returned as-is.
pub fn decode_value(raw: String) -> StoreValue {
  match serde_json::from_str::<Value>(&raw) {
    Ok(Value::String(s)) => StoreValue::Text(s),
    Ok(v) => match decode_bytes(&v) {
      Some(bytes) => StoreValue::Bytes(bytes),
      None => StoreValue::Json(v),
    },
    Err(_) => StoreValue::Text(raw),
  }
}

fn decode_bytes(v: &Value) -> Option<Vec<u8>> {
  let obj = v.as_object()?;
  if obj.len() != 2 || obj.get("kind")?.as_str()? != BYTES_KIND {
    return None;
  }
  obj
    .get("data")?
    .as_array()?
    .iter()
    .map(|n| n.as_u64().and_then(|n| u8::try_from(n).ok()))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn roundtrip(v: StoreValue) -> StoreValue {
    decode_value(encode_value("k", &v).unwrap())
  }

  #[test]
  fn bytes_use_tagged_form() {
    let raw = encode_value("k", &StoreValue::Bytes(vec![0, 7, 255])).unwrap();
    assert_eq!(raw, r#"{"data":[0,7,255],"kind":"bytes"}"#);
  }

  #[test]
  fn null_is_rejected() {
    let err = encode_value("k", &StoreValue::Json(Value::Null)).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { key, .. } if key == "k"));
  }

  #[test]
  fn plain_text_is_stored_verbatim() {
    assert_eq!(encode_value("k", &"hello world".into()).unwrap(), "hello world");
  }

  #[test]
  fn json_looking_text_survives() {
    for s in ["123", "true", "null", "{\"a\":1}", "\"quoted\""] {
      assert_eq!(roundtrip(s.into()), StoreValue::Text(s.to_owned()));
    }
  }

  #[test]
  fn unparsable_text_decodes_raw() {
    assert_eq!(
      decode_value("{not json".to_owned()),
      StoreValue::Text("{not json".to_owned())
    );
  }

  #[test]
  fn out_of_range_bytes_stay_json() {
    let v = json!({ "kind": "bytes", "data": [1, 256] });
    assert_eq!(roundtrip(StoreValue::Json(v.clone())), StoreValue::Json(v));
  }

  #[test]
  fn tagged_byte_shape_is_rejected_as_json() {
    let v = json!({ "kind": "bytes", "data": [104, 105] });
    let err = encode_value("k", &StoreValue::Json(v)).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));

    let empty = json!({ "kind": "bytes", "data": [] });
    assert!(encode_value("k", &StoreValue::Json(empty)).is_err());
  }

  #[test]
  fn json_string_canonicalises_to_text() {
    assert_eq!(
      StoreValue::from(json!("abc")),
      StoreValue::Text("abc".to_owned())
    );
  }
}
