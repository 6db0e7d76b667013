use crate::chart::Dimension;
use crate::data::{DataType, Dataset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Columns bound to one dimension, with the type check precomputed at bind time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub ids: Vec<String>,
    #[serde(default)]
    pub is_valid: bool,
    #[serde(default)]
    pub mapped_type: Option<DataType>,
}

impl MappingEntry {
    /// Bind `columns` to `dimension`, checking them against the dataset's inferred types.
    ///
    /// The entry is valid when every column exists with an accepted type and a
    /// single-valued dimension receives at most one column. `mapped_type` is the
    /// offending type of an invalid entry, otherwise the type shared by the columns.
    pub fn bind(dimension: &Dimension, columns: &[String], dataset: &Dataset) -> Self {
        let ids: Vec<String> = columns.to_vec();
        let types: Vec<Option<DataType>> = ids.iter().map(|c| dataset.column_type(c)).collect();

        let offending = types.iter().find(|t| match t {
            Some(t) => !dimension.accepts_type(*t),
            None => true,
        });

        let (is_valid, mapped_type) = match offending {
            Some(t) => (false, *t),
            None if !dimension.multiple && ids.len() > 1 => (false, types.first().copied().flatten()),
            None => (true, types.first().copied().flatten()),
        };

        if !is_valid {
            debug!(dimension = %dimension.id, columns = ?ids, "Mapped columns rejected by dimension");
        }

        Self {
            ids,
            is_valid,
            mapped_type,
        }
    }

    /// True when at least one non-empty column id is bound
    pub fn is_mapped(&self) -> bool {
        self.ids.iter().any(|id| !id.is_empty())
    }

    /// Bound column ids, skipping empty placeholders
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str).filter(|id| !id.is_empty())
    }
}

/// Dimension id to mapping entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Mapping(BTreeMap<String, MappingEntry>);

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dimension: &str, entry: MappingEntry) {
        self.0.insert(dimension.to_string(), entry);
    }

    pub fn remove(&mut self, dimension: &str) -> Option<MappingEntry> {
        self.0.remove(dimension)
    }

    pub fn get(&self, dimension: &str) -> Option<&MappingEntry> {
        self.0.get(dimension)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MappingEntry)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// First column bound to `dimension`, if any
    pub fn column(&self, dimension: &str) -> Option<&str> {
        self.get(dimension).and_then(|e| e.columns().next())
    }

    /// All columns bound to `dimension`, in mapping order
    pub fn columns(&self, dimension: &str) -> Vec<&str> {
        self.get(dimension).map(|e| e.columns().collect()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset::from_raw(
            vec!["n".into(), "s".into(), "m".into()],
            vec![vec!["1".into(), "a".into(), "2".into()]],
        )
        .unwrap()
    }

    fn numeric_dim() -> Dimension {
        Dimension::new("value", "Value").accepts(&[DataType::Number])
    }

    #[test]
    fn test_bind_valid() {
        let entry = MappingEntry::bind(&numeric_dim(), &["n".to_string()], &dataset());
        assert!(entry.is_valid);
        assert_eq!(entry.mapped_type, Some(DataType::Number));
    }

    #[test]
    fn test_bind_reports_offending_type() {
        let dim = numeric_dim().multiple();
        let entry = MappingEntry::bind(&dim, &["n".to_string(), "s".to_string()], &dataset());
        assert!(!entry.is_valid);
        assert_eq!(entry.mapped_type, Some(DataType::String));
    }

    #[test]
    fn test_bind_unknown_column() {
        let entry = MappingEntry::bind(&numeric_dim(), &["zzz".to_string()], &dataset());
        assert!(!entry.is_valid);
        assert_eq!(entry.mapped_type, None);
    }

    #[test]
    fn test_bind_too_many_for_single_dimension() {
        let entry = MappingEntry::bind(&numeric_dim(), &["n".to_string(), "m".to_string()], &dataset());
        assert!(!entry.is_valid);
    }

    #[test]
    fn test_mapping_serde_shape() {
        let mut mapping = Mapping::new();
        mapping.insert("value", MappingEntry::bind(&numeric_dim(), &["n".to_string()], &dataset()));
        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["value"]["ids"][0], "n");
        assert_eq!(json["value"]["isValid"], true);
        assert_eq!(json["value"]["mappedType"], "number");
        let back: Mapping = serde_json::from_value(json).unwrap();
        assert_eq!(back, mapping);
    }

    #[test]
    fn test_empty_ids_are_unmapped() {
        let entry = MappingEntry {
            ids: vec![String::new()],
            ..Default::default()
        };
        assert!(!entry.is_mapped());
        let mut mapping = Mapping::new();
        mapping.insert("x", entry);
        assert_eq!(mapping.column("x"), None);
    }
}
