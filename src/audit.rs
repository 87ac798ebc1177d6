//! Input fingerprinting
//!
//! Every result carries a hash of the inputs it was computed from, so a
//! caller can tell whether two results answer the same question.

use crate::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use tracing::warn;

/// SHA-256 of the JSON serialization of `inputs`, hex encoded.
/// Streams straight into the hasher without an intermediate String.
pub fn try_compute_input_fingerprint<T: Serialize + ?Sized>(inputs: &T) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut HashWriter(&mut hasher), inputs)?;

    Ok(hex::encode(hasher.finalize()))
}

/// Like `try_compute_input_fingerprint`, empty when the inputs cannot be serialized
pub fn compute_input_fingerprint<T: Serialize + ?Sized>(inputs: &T) -> String {
    try_compute_input_fingerprint(inputs).unwrap_or_else(|e| {
        warn!(error = %e, "Could not fingerprint inputs");
        String::new()
    })
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_fingerprint_is_stable() {
        let a = compute_input_fingerprint(&json!({"rate": 50.0, "customers": 1000}));
        let b = compute_input_fingerprint(&json!({"rate": 50.0, "customers": 1000}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_inputs() {
        let a = compute_input_fingerprint(&json!({"rate": 50.0}));
        let b = compute_input_fingerprint(&json!({"rate": 51.0}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_unserializable_inputs() {
        // JSON object keys must be strings
        let inputs: BTreeMap<Vec<u8>, u8> = BTreeMap::from([(vec![1, 2], 3)]);
        let err = try_compute_input_fingerprint(&inputs).unwrap_err();
        assert!(matches!(err, EngineError::SerializationError(_)));
        assert!(compute_input_fingerprint(&inputs).is_empty());
    }
}
