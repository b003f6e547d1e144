//! JSON loading that reports where in the document decoding failed.
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

fn located(err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    let path = err.path().to_string();
    Error::invalid_json(path, err.into_inner().to_string())
}

/// Deserialize with the JSON path of the failure in the error.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize(de).map_err(located)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(de).map_err(located)
}

/// Same, for a document already parsed (e.g. selected by a JSON pointer).
pub fn from_value_with_path<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_path_to_error::deserialize(value).map_err(located)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BigMapDiff;

    #[test]
    fn reports_failing_path() {
        let src = r#"[{"ptr": 1, "key": {"int": "1"}}, {"ptr": "x", "key": {"int": "2"}}]"#;
        match from_str_with_path::<Vec<BigMapDiff>>(src) {
            Err(Error::InvalidJsonData { path, .. }) => assert_eq!(path, "[1].ptr"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_values() {
        let diffs: Vec<BigMapDiff> =
            from_value_with_path(serde_json::json!([{"ptr": 3, "key": {"string": "a"}}])).unwrap();
        assert_eq!(diffs[0].ptr, 3);
        assert!(diffs[0].value.is_none());
    }
}
