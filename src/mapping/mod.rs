//! Projection of parsed columns onto caller-chosen variable names.

use indexmap::IndexMap;

use crate::core::{ColumnValueSet, is_pseudo};

/// Local variable name -> external field name.
pub type Mapping = IndexMap<String, String>;

/// External field name -> required value.
pub type Filters = IndexMap<String, String>;

/// Drop rows whose filtered columns do not match.
///
/// Rows are removed from every column at once, so columns stay aligned. A
/// filtered column holding a single value is treated as a scalar: if it
/// does not match, the whole result is emptied.
pub fn apply_filters(values: &mut ColumnValueSet, filters: &Filters) {
    if filters.is_empty() {
        return;
    }

    let rows = values.data_row_count();
    let mut keep = vec![true; rows];

    for (field, wanted) in filters {
        let wanted = wanted.trim();
        let Some((_, column)) = values.find(field) else {
            // Nothing to compare against: no row can match.
            keep.iter_mut().for_each(|k| *k = false);
            continue;
        };
        if column.len() == 1 {
            if column[0].trim() != wanted {
                clear_data(values);
                return;
            }
            continue;
        }
        for (row, flag) in keep.iter_mut().enumerate() {
            let value = column.get(row).map(|v| v.trim()).unwrap_or("");
            if value != wanted {
                *flag = false;
            }
        }
    }

    for (name, column) in values.iter_mut() {
        if is_pseudo(name) {
            continue;
        }
        let mut row = 0;
        column.retain(|_| {
            let kept = keep.get(row).copied().unwrap_or(false);
            row += 1;
            kept
        });
    }
}

fn clear_data(values: &mut ColumnValueSet) {
    for (name, column) in values.iter_mut() {
        if !is_pseudo(name) {
            column.clear();
        }
    }
}

/// Project columns to local names. Lookup is exact, then case-insensitive;
/// unmapped fields are dropped. Without a mapping every column is kept
/// under its own name. Pseudo-columns are carried unless already mapped.
pub fn map_values(values: &ColumnValueSet, mapping: &Mapping) -> ColumnValueSet {
    if mapping.is_empty() {
        return values.clone();
    }

    let mut out = ColumnValueSet::new();
    for (local, external) in mapping {
        let column = values
            .find(external)
            .map(|(_, column)| column.clone())
            .unwrap_or_default();
        out.set(local, column);
    }

    for (name, column) in values.iter() {
        if is_pseudo(name) && !mapping.values().any(|external| external == name) && !out.contains(name) {
            out.set(name, column.clone());
        }
    }
    out
}

/// Filter, then map.
pub fn filter_and_map(mut values: ColumnValueSet, filters: &Filters, mapping: &Mapping) -> ColumnValueSet {
    apply_filters(&mut values, filters);
    map_values(&values, mapping)
}
