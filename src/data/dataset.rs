//! JSON-stat dataset payload as served by the Eurostat dissemination API
//!
//! The payload encodes an N-dimensional categorical cube as a flat mapping from
//! a linear index to a value. The types here mirror the wire shape closely so a
//! fetched payload can be cached and handed back to callers unchanged.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// A string-keyed mapping that keeps document order
///
/// JSON-stat relies on the declared order of categories, so a `HashMap` alone
/// would lose information. Entries live in a `Vec`; `positions` maps each key to
/// its slot so inserts and lookups stay constant time on large `value` objects.
#[derive(Debug, Clone)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    positions: HashMap<String, usize>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<V: PartialEq> PartialEq for OrderedMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    /// Inserts a value, replacing an existing entry in place
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.positions.get(&key) {
            Some(&slot) => self.entries[slot].1 = value,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.positions.get(key).map(|&slot| &self.entries[slot].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the entry at the given position in declared order
    pub fn get_index(&self, position: usize) -> Option<(&str, &V)> {
        self.entries.get(position).map(|(k, v)| (k.as_str(), v))
    }

    pub fn first(&self) -> Option<(&str, &V)> {
        self.get_index(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Position index of a category list
///
/// Eurostat sends an object of `key -> position`; JSON-stat also allows a plain
/// array of keys in position order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryIndex {
    Positions(OrderedMap<usize>),
    Keys(Vec<String>),
}

/// Categories of one dimension
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<CategoryIndex>,
    /// Category key to human-readable label, in declared order
    #[serde(default)]
    pub label: OrderedMap<String>,
}

impl Category {
    /// Number of categories on this axis
    pub fn size(&self) -> usize {
        match &self.index {
            Some(CategoryIndex::Positions(map)) => map.len(),
            Some(CategoryIndex::Keys(keys)) => keys.len(),
            None => self.label.len(),
        }
    }

    /// Category keys laid out by position
    ///
    /// A slot is `None` when the index declares no key for that position.
    pub fn keys_by_position(&self) -> Vec<Option<&str>> {
        match &self.index {
            Some(CategoryIndex::Positions(map)) => {
                let mut slots = vec![None; map.len()];
                for (key, &position) in map.iter() {
                    if let Some(slot) = slots.get_mut(position) {
                        *slot = Some(key);
                    }
                }
                slots
            }
            Some(CategoryIndex::Keys(keys)) => keys.iter().map(|k| Some(k.as_str())).collect(),
            None => self.label.keys().map(Some).collect(),
        }
    }

    /// Resolves a category key to its label
    ///
    /// Categories without any labels use their keys as labels.
    pub fn label_for<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        if self.label.is_empty() {
            return Some(key);
        }
        self.label.get(key).map(String::as_str)
    }

    /// Labels laid out by position, `None` where the position cannot be resolved
    pub fn labels_by_position(&self) -> Vec<Option<&str>> {
        self.keys_by_position()
            .into_iter()
            .map(|key| key.and_then(|k| self.label_for(k)))
            .collect()
    }

    /// Label of the first category in declared order
    pub fn first_label(&self) -> Option<&str> {
        self.labels_by_position().into_iter().next().flatten()
    }
}

/// A named axis of the dataset
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub category: Category,
}

impl Dimension {
    pub fn size(&self) -> usize {
        self.category.size()
    }
}

/// Observation values keyed by linear index
///
/// Eurostat sends a sparse object; dense arrays are also valid JSON-stat.
/// Absent indices and `null` entries are missing observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Values {
    Sparse(OrderedMap<Option<f64>>),
    Dense(Vec<Option<f64>>),
}

impl Default for Values {
    fn default() -> Self {
        Values::Sparse(OrderedMap::new())
    }
}

/// Present observations in ascending index order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PresentValues {
    pub entries: Vec<(usize, f64)>,
    /// Keys that could not be parsed as a linear index
    pub invalid_keys: Vec<String>,
}

impl Values {
    /// Number of non-null observations
    pub fn count(&self) -> usize {
        match self {
            Values::Sparse(map) => map.iter().filter(|(_, v)| v.is_some()).count(),
            Values::Dense(values) => values.iter().filter(|v| v.is_some()).count(),
        }
    }

    /// Collects non-null observations sorted by numeric index
    pub fn present(&self) -> PresentValues {
        let mut present = PresentValues::default();
        match self {
            Values::Sparse(map) => {
                for (key, value) in map.iter() {
                    let Some(value) = value else { continue };
                    match key.trim().parse::<usize>() {
                        Ok(index) => present.entries.push((index, *value)),
                        Err(_) => present.invalid_keys.push(key.to_string()),
                    }
                }
                present.entries.sort_by_key(|(index, _)| *index);
            }
            Values::Dense(values) => {
                present.entries = values
                    .iter()
                    .enumerate()
                    .filter_map(|(index, value)| value.map(|v| (index, v)))
                    .collect();
            }
        }
        present
    }
}

/// The payload returned by the remote provider
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Dimension names, slowest varying first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id: Vec<String>,
    /// Dimension sizes, parallel to `id`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub size: Vec<usize>,
    pub dimension: OrderedMap<Dimension>,
    #[serde(default)]
    pub value: Values,
    /// Remaining provider fields (status flags, extensions), carried through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawDataset {
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimension.get(name)
    }

    /// Label map of a dimension, or an empty map when the axis is absent
    pub fn labels_of(&self, name: &str) -> OrderedMap<String> {
        self.dimension(name)
            .map(|d| d.category.label.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EUROSTAT_SAMPLE: &str = r#"{
        "version": "2.0",
        "class": "dataset",
        "label": "GDP and main components",
        "source": "ESTAT",
        "updated": "2024-10-01T23:00:00+0200",
        "id": ["freq", "unit", "na_item", "geo", "time"],
        "size": [1, 1, 2, 1, 3],
        "dimension": {
            "freq": {"label": "Time frequency", "category": {"index": {"A": 0}, "label": {"A": "Annual"}}},
            "unit": {"category": {"index": {"CP_MEUR": 0}, "label": {"CP_MEUR": "Current prices, million euro"}}},
            "na_item": {"category": {"index": {"B1GQ": 0, "P3": 1}, "label": {"B1GQ": "Gross domestic product", "P3": "Final consumption expenditure"}}},
            "geo": {"category": {"index": {"IT": 0}, "label": {"IT": "Italy"}}},
            "time": {"category": {"index": {"2021": 0, "2022": 1, "2023": 2}, "label": {"2021": "2021", "2022": "2022", "2023": "2023"}}}
        },
        "value": {"0": 1.5, "10": 3.0, "2": 2.5, "5": null},
        "status": {"2": "p"}
    }"#;

    #[test]
    fn test_parses_eurostat_payload() {
        let raw: RawDataset = serde_json::from_str(EUROSTAT_SAMPLE).expect("Should parse");

        assert_eq!(raw.id, vec!["freq", "unit", "na_item", "geo", "time"]);
        assert_eq!(raw.size, vec![1, 1, 2, 1, 3]);
        assert_eq!(raw.dimension.len(), 5);
        assert_eq!(raw.label.as_deref(), Some("GDP and main components"));
        assert!(raw.extra.contains_key("status"));
        assert!(raw.extra.contains_key("version"));
    }

    #[test]
    fn test_category_labels_keep_declared_order() {
        let raw: RawDataset = serde_json::from_str(EUROSTAT_SAMPLE).expect("Should parse");
        let na_item = raw.dimension("na_item").expect("na_item axis");

        let keys: Vec<&str> = na_item.category.label.keys().collect();
        assert_eq!(keys, vec!["B1GQ", "P3"]);
        assert_eq!(
            na_item.category.labels_by_position(),
            vec![Some("Gross domestic product"), Some("Final consumption expenditure")]
        );
    }

    #[test]
    fn test_present_values_sorted_numerically_and_skip_null() {
        let raw: RawDataset = serde_json::from_str(EUROSTAT_SAMPLE).expect("Should parse");
        let present = raw.value.present();

        assert_eq!(present.entries, vec![(0, 1.5), (2, 2.5), (10, 3.0)]);
        assert!(present.invalid_keys.is_empty());
        assert_eq!(raw.value.count(), 3);
    }

    #[test]
    fn test_invalid_value_keys_are_reported() {
        let values: Values = serde_json::from_str(r#"{"1": 2.0, "x": 3.0}"#).unwrap();
        let present = values.present();

        assert_eq!(present.entries, vec![(1, 2.0)]);
        assert_eq!(present.invalid_keys, vec!["x".to_string()]);
    }

    #[test]
    fn test_dense_values() {
        let values: Values = serde_json::from_str("[1.0, null, 3.0]").unwrap();
        assert_eq!(values.present().entries, vec![(0, 1.0), (2, 3.0)]);
    }

    #[test]
    fn test_index_as_key_array() {
        let category: Category =
            serde_json::from_str(r#"{"index": ["b", "a"], "label": {"a": "Alpha", "b": "Beta"}}"#)
                .unwrap();

        assert_eq!(category.size(), 2);
        assert_eq!(category.labels_by_position(), vec![Some("Beta"), Some("Alpha")]);
        assert_eq!(category.first_label(), Some("Beta"));
    }

    #[test]
    fn test_category_without_labels_uses_keys() {
        let category: Category = serde_json::from_str(r#"{"index": {"2020": 0}}"#).unwrap();
        assert_eq!(category.first_label(), Some("2020"));
    }

    #[test]
    fn test_position_without_key_is_unresolved() {
        let category: Category =
            serde_json::from_str(r#"{"index": {"a": 0, "b": 5}, "label": {"a": "A", "b": "B"}}"#)
                .unwrap();

        assert_eq!(category.labels_by_position(), vec![Some("A"), None]);
    }

    #[test]
    fn test_missing_dimension_member_is_parse_error() {
        let result: Result<RawDataset, _> = serde_json::from_str(r#"{"value": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_label_for_falls_back_to_key_without_labels() {
        let unlabelled: Category = serde_json::from_str(r#"{"index": {"EUR": 0}}"#).unwrap();
        let labelled: Category =
            serde_json::from_str(r#"{"index": {"EUR": 0}, "label": {"EUR": "Euro"}}"#).unwrap();

        assert_eq!(unlabelled.label_for("EUR"), Some("EUR"));
        assert_eq!(labelled.label_for("EUR"), Some("Euro"));
        assert_eq!(labelled.label_for("USD"), None);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("a", 3);

        let entries: Vec<(&str, &i32)> = map.iter().collect();
        assert_eq!(entries, vec![("a", &3), ("b", &2)]);
        assert_eq!(map.get("a"), Some(&3));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_large_sparse_values_parse_quickly() {
        let n = 100_000;
        let body = (0..n)
            .map(|i| format!("\"{}\":{}.5", i * 3, i))
            .collect::<Vec<_>>()
            .join(",");
        let json = format!("{{{}}}", body);

        let started = std::time::Instant::now();
        let values: Values = serde_json::from_str(&json).expect("Should parse");
        let elapsed = started.elapsed();

        assert_eq!(values.count(), n);
        assert_eq!(values.present().entries[1], (3, 1.5));
        assert!(
            elapsed < std::time::Duration::from_secs(5),
            "parsing {} values took {:?}",
            n,
            elapsed
        );
    }

    #[test]
    fn test_serialization_preserves_order() {
        let map: OrderedMap<String> =
            [("z", "last".to_string()), ("a", "first".to_string())].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"z":"last","a":"first"}"#);
    }
}
