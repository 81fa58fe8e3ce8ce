use qbench_core::errors::BenchError;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::serde::to_canonical_json_bytes;

/// Computes a stable hexadecimal SHA-256 over the canonical JSON of `value`.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, BenchError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(format!("{:x}", Sha256::digest(bytes)))
}
