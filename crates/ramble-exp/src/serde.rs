use std::collections::BTreeMap;
use std::iter::FromIterator;

use ramble_core::{ErrorInfo, RambleError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

fn serde_error(code: &str, err: impl ToString) -> RambleError {
    RambleError::Serde(ErrorInfo::new(code, err.to_string()))
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

/// Serializes a value into canonical JSON bytes with sorted object keys.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, RambleError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("serde.json_serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer_pretty(&mut bytes, &canonical)
        .map_err(|err| serde_error("serde.json_write", err))?;
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, RambleError> {
    serde_json::from_slice(data).map_err(|err| serde_error("serde.json_deserialize", err))
}

/// Deserializes a YAML document into the requested type.
pub fn from_yaml_str<T: DeserializeOwned>(data: &str) -> Result<T, RambleError> {
    serde_yaml::from_str(data).map_err(|err| serde_error("serde.yaml_deserialize", err))
}

/// Serializes a value into YAML.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, RambleError> {
    serde_yaml::to_string(value).map_err(|err| serde_error("serde.yaml_serialize", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_bytes_sort_keys() {
        let bytes = to_canonical_json_bytes(&json!({"b": 1, "a": {"d": 2, "c": 3}})).expect("encode");
        let text = String::from_utf8(bytes).expect("utf8");
        let a = text.find("\"a\"").expect("a");
        let b = text.find("\"b\"").expect("b");
        let c = text.find("\"c\"").expect("c");
        let d = text.find("\"d\"").expect("d");
        assert!(a < b && c < d);
    }
}
