//! # JSON Bodies
//!
//! Request body parsing with simd-json, response encoding with serde_json.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Only turns bytes into values and back
//! - **D**: Callers see `serde_json::Value`, never the parser's own types

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Parse a request body
///
/// An empty (or all-whitespace) body is `Value::Null`, which validation
/// treats as having no fields.
///
/// # Errors
///
/// Returns `Error::InvalidBody` if the bytes are not valid JSON.
pub fn parse_body(bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    // simd-json parses in place
    let mut buffer = bytes.to_vec();
    simd_json::from_slice(&mut buffer).map_err(|e| Error::InvalidBody {
        reason: format!("Parse error: {e}"),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Serialize a value to pretty-printed JSON
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_object() {
        let value = parse_body(br#"{"name": "Paul", "tracks": [1, 2]}"#).unwrap();
        assert_eq!(value, json!({ "name": "Paul", "tracks": [1, 2] }));
    }

    #[test]
    fn test_empty_body_is_null() {
        assert_eq!(parse_body(b"").unwrap(), Value::Null);
        assert_eq!(parse_body(b"  \n").unwrap(), Value::Null);
    }

    #[test]
    fn test_invalid_body() {
        let err = parse_body(b"{name").unwrap_err();
        assert!(matches!(err, Error::InvalidBody { .. }));
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(to_json(&json!({ "ok": true })).unwrap(), r#"{"ok":true}"#);
        assert!(to_json_pretty(&json!({ "ok": true })).unwrap().contains('\n'));
    }
}
