//! Mapping between class indices and human-readable class names.

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Object entries in document order, repeated keys included.
struct RawEntries(Vec<(String, serde_json::Value)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object of class name to index")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, serde_json::Value>()? {
                    entries.push(entry);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// A bijection between class indices and class names.
///
/// The on-disk form is the mapping written at training time, from class name
/// to output index:
///
/// ```json
/// { "cat": 0, "dog": 1 }
/// ```
///
/// It is inverted on load. Indices need not be contiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    by_index: BTreeMap<usize, String>,
    by_name: HashMap<String, usize>,
}

impl LabelMap {
    /// Builds a label map from `(index, name)` pairs.
    ///
    /// Fails on an empty input, a repeated index or a repeated name.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        let mut by_index = BTreeMap::new();
        let mut by_name = HashMap::new();
        for (index, name) in pairs {
            let name = name.into();
            if let Some(existing) = by_index.get(&index) {
                return Err(format!(
                    "index {} is assigned to both '{}' and '{}'",
                    index, existing, name
                ));
            }
            if by_name.contains_key(&name) {
                return Err(format!("class name '{}' appears more than once", name));
            }
            by_name.insert(name.clone(), index);
            by_index.insert(index, name);
        }
        if by_index.is_empty() {
            return Err("label map is empty".to_string());
        }
        Ok(Self { by_index, by_name })
    }

    /// Parses the `{ "name": index }` JSON form.
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        Self::from_json_slice(json.as_bytes())
    }

    /// Parses the `{ "name": index }` JSON form from raw bytes.
    ///
    /// Every entry is kept in file order, so a class name that appears twice
    /// is rejected instead of silently overwriting the earlier entry.
    pub fn from_json_slice(json: &[u8]) -> Result<Self, String> {
        let RawEntries(entries) =
            serde_json::from_slice(json).map_err(|e| format!("invalid JSON: {}", e))?;

        let mut pairs = Vec::with_capacity(entries.len());
        for (name, index) in entries {
            let index = index
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| {
                    format!(
                        "index for '{}' must be a non-negative integer, got {}",
                        name, index
                    )
                })?;
            pairs.push((index, name));
        }
        Self::from_pairs(pairs)
    }

    /// Class name for an output index.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.by_index.get(&index).map(String::as_str)
    }

    /// Output index for a class name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Largest index in the map.
    pub fn max_index(&self) -> Option<usize> {
        self.by_index.keys().next_back().copied()
    }

    /// Entries in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.by_index.iter().map(|(i, n)| (*i, n.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverts_name_to_index_json() {
        let map = LabelMap::from_json_str(r#"{"A": 0, "B": 1, "C": 2}"#).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.name(1), Some("B"));
        assert_eq!(map.index_of("C"), Some(2));
        assert_eq!(map.name(3), None);
        let names: Vec<_> = map.iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_sparse_indices_are_allowed() {
        let map = LabelMap::from_json_str(r#"{"cat": 0, "dog": 5}"#).unwrap();
        assert_eq!(map.max_index(), Some(5));
        assert_eq!(map.name(5), Some("dog"));
    }

    #[test]
    fn test_rejects_malformed_maps() {
        for json in [
            r#"{}"#,
            r#"["cat", "dog"]"#,
            r#"{"cat": -1}"#,
            r#"{"cat": 0.5}"#,
            r#"{"cat": "0"}"#,
            r#"{"cat": 0, "dog": 0}"#,
            r#"{"cat": 0, "cat": 1}"#,
            r#"not json"#,
        ] {
            assert!(LabelMap::from_json_str(json).is_err(), "accepted {}", json);
        }
    }

    #[test]
    fn test_repeated_class_name_is_rejected() {
        let err = LabelMap::from_json_str(r#"{"A": 0, "A": 1}"#).unwrap_err();
        assert!(err.contains("'A' appears more than once"), "{}", err);
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = LabelMap::from_json_slice(&[0xff, 0xfe, b'{', b'}']).unwrap_err();
        assert!(err.starts_with("invalid JSON"), "{}", err);
    }

    #[test]
    fn test_duplicate_index_names_both_classes() {
        let err = LabelMap::from_pairs([(0, "cat"), (0, "dog")]).unwrap_err();
        assert!(err.contains("'cat'") && err.contains("'dog'"));
    }
}
