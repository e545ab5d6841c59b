//! Serde helpers for decoding upstream payloads field by field.
//!
//! Upstream bodies are only trusted to be JSON. A field that is missing or has
//! the wrong shape falls back to its default instead of failing the document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode `T`, or `T::default()` when the value has the wrong shape.
///
/// Arrays always fall back: serde_json would otherwise fill a struct from an
/// array positionally. Lists go through [`seq`].
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        Value::Array(_) => Ok(T::default()),
        value => Ok(serde_json::from_value(value).unwrap_or_default()),
    }
}

/// Decode a whole upstream document or event payload; anything but an
/// object yields `T::default()`.
pub fn document<T>(value: Value) -> T
where
    T: DeserializeOwned + Default,
{
    if value.is_object() {
        serde_json::from_value(value).unwrap_or_default()
    } else {
        T::default()
    }
}

/// Decode a list of objects, keeping only the elements that decode as `T`.
pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "or_default")]
        name: Option<String>,
        #[serde(default, deserialize_with = "or_default")]
        count: u64,
        #[serde(default, deserialize_with = "seq")]
        items: Vec<Item>,
        #[serde(default, deserialize_with = "or_default")]
        counts: Option<Counts>,
    }

    #[derive(Debug, Deserialize)]
    struct Item {
        text: String,
    }

    #[derive(Debug, Default, Deserialize)]
    struct Counts {
        #[serde(default)]
        input: u64,
        #[serde(default)]
        output: u64,
    }

    #[test]
    fn test_arrays_never_fill_structs() {
        let sample: Sample =
            serde_json::from_str(r#"{"counts": [1, 2], "items": [["a"], {"text": "b"}]}"#).unwrap();
        assert!(sample.counts.is_none());
        let texts: Vec<&str> = sample.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["b"]);

        let sample: Sample = serde_json::from_str(r#"{"counts": {"input": 1, "output": 2}}"#).unwrap();
        let counts = sample.counts.unwrap();
        assert_eq!((counts.input, counts.output), (1, 2));
    }

    #[test]
    fn test_wrong_types_fall_back() {
        let sample: Sample =
            serde_json::from_str(r#"{"name": 12, "count": "many", "items": "nope"}"#).unwrap();
        assert_eq!(sample.name, None);
        assert_eq!(sample.count, 0);
        assert!(sample.items.is_empty());
    }

    #[test]
    fn test_bad_elements_are_dropped() {
        let sample: Sample = serde_json::from_str(
            r#"{"name": "x", "count": 3, "items": [{"text": "a"}, 7, {"other": 1}, {"text": "b"}]}"#,
        )
        .unwrap();
        assert_eq!(sample.name.as_deref(), Some("x"));
        assert_eq!(sample.count, 3);
        let texts: Vec<&str> = sample.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_absent_fields_default() {
        let sample: Sample = serde_json::from_str("{}").unwrap();
        assert_eq!(sample.name, None);
        assert!(sample.items.is_empty());
    }
}
