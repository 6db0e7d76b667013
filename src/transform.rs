use crate::data::{Dataset, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Grouping key with natural ordering: numbers numerically, dates chronologically, text lexically.
#[derive(Debug, Clone)]
pub struct GroupKey(pub Value);

impl GroupKey {
    pub fn label(&self) -> String {
        self.0.key()
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.natural_cmp(&other.0)
    }
}

/// Distinct non-null values of a column, ascending in natural order
pub fn distinct_values(dataset: &Dataset, column: &str) -> Vec<Value> {
    let Some(idx) = dataset.column_index(column) else {
        return Vec::new();
    };
    let keys: BTreeSet<GroupKey> = dataset
        .rows()
        .iter()
        .map(|row| &row[idx])
        .filter(|value| !value.is_null())
        .map(|value| GroupKey(value.clone()))
        .collect();
    keys.into_iter().map(|k| k.0).collect()
}

/// String labels of [`distinct_values`]
pub fn distinct_keys(dataset: &Dataset, column: &str) -> Vec<String> {
    distinct_values(dataset, column).iter().map(Value::key).collect()
}

/// Group row indices by the value of one column. Rows with a null key are dropped.
pub fn group_rows(dataset: &Dataset, column: &str) -> BTreeMap<GroupKey, Vec<usize>> {
    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    if let Some(idx) = dataset.column_index(column) {
        for (i, row) in dataset.rows().iter().enumerate() {
            if row[idx].is_null() {
                continue;
            }
            groups.entry(GroupKey(row[idx].clone())).or_default().push(i);
        }
    }
    groups
}

/// Grid shape for `n_panels` small multiples. `ncol` of zero means square-ish.
pub fn calculate_grid_dimensions(n_panels: usize, ncol: usize) -> (usize, usize) {
    if n_panels == 0 {
        return (0, 0);
    }
    let cols = if ncol > 0 {
        ncol.min(n_panels)
    } else {
        (n_panels as f64).sqrt().ceil() as usize
    };
    let rows = n_panels.div_ceil(cols);
    (rows, cols)
}
