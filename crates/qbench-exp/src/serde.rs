use std::collections::BTreeMap;
use std::iter::FromIterator;

use qbench_core::errors::{BenchError, ErrorInfo};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

fn serde_error(code: &str, err: impl ToString) -> BenchError {
    BenchError::Persistence(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into JSON bytes with object keys in sorted order.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, BenchError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json-serialize", err))?;
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonicalize(value))
        .map_err(|err| serde_error("json-write", err))?;
    Ok(bytes)
}

/// Canonical JSON as a string, for text columns.
pub fn to_canonical_json_string<T: Serialize>(value: &T) -> Result<String, BenchError> {
    let bytes = to_canonical_json_bytes(value)?;
    String::from_utf8(bytes).map_err(|err| serde_error("json-utf8", err))
}

pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, BenchError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json-deserialize", err))
}
