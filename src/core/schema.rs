//! Purpose: Describe the ordered column metadata of a row source.
//! Exports: `SchemaDescriptor`, `ColumnDescriptor`, `column_name`, `parse_column_name`.
//! Role: Schema-description query answered to database clients.
//! Invariants: Names are positional (`c<ordinal>`); size is always -1; no key inference.
//! Invariants: Immutable once built; shared by every cursor of one projection.

use serde::{Deserialize, Serialize};

use crate::core::cell::CellKind;

pub const UNKNOWN_SIZE: i32 = -1;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub ordinal: usize,
    pub name: String,
    pub data_type: CellKind,
    pub size: i32,
    pub nullable: bool,
    pub is_key: bool,
}

impl ColumnDescriptor {
    pub fn new(ordinal: usize, data_type: CellKind, nullable: bool) -> Self {
        Self {
            ordinal,
            name: column_name(ordinal),
            data_type,
            size: UNKNOWN_SIZE,
            nullable,
            is_key: false,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDescriptor {
    columns: Vec<ColumnDescriptor>,
}

impl SchemaDescriptor {
    /// Build from `(declared kind, nullable)` pairs in column order.
    pub fn from_columns(columns: impl IntoIterator<Item = (CellKind, bool)>) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(ordinal, (kind, nullable))| ColumnDescriptor::new(ordinal, kind, nullable))
            .collect();
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, ordinal: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(ordinal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor> + '_ {
        self.columns.iter()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

pub fn column_name(ordinal: usize) -> String {
    format!("c{ordinal}")
}

/// Resolve a canonical `c<ordinal>` name; any other spelling is not found.
pub fn parse_column_name(name: &str, field_count: usize) -> Option<usize> {
    let digits = name.strip_prefix('c')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let ordinal: usize = digits.parse().ok()?;
    (ordinal < field_count).then_some(ordinal)
}

#[cfg(test)]
mod tests {
    use super::{SchemaDescriptor, UNKNOWN_SIZE, parse_column_name};
    use crate::core::cell::CellKind;
    use serde_json::json;

    #[test]
    fn columns_are_named_by_ordinal() {
        let schema = SchemaDescriptor::from_columns([
            (CellKind::I32, false),
            (CellKind::Text, true),
            (CellKind::F64, true),
        ]);
        assert_eq!(schema.len(), 3);
        let names: Vec<_> = schema.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["c0", "c1", "c2"]);
        for (i, column) in schema.iter().enumerate() {
            assert_eq!(column.ordinal, i);
            assert_eq!(column.size, UNKNOWN_SIZE);
            assert!(!column.is_key);
        }
        assert!(!schema.column(0).expect("c0").nullable);
        assert!(schema.column(2).expect("c2").nullable);
    }

    #[test]
    fn name_resolution_is_positional_only() {
        assert_eq!(parse_column_name("c0", 2), Some(0));
        assert_eq!(parse_column_name("c1", 2), Some(1));
        assert_eq!(parse_column_name("c2", 2), None);
        assert_eq!(parse_column_name("id", 2), None);
        assert_eq!(parse_column_name("c", 2), None);
        assert_eq!(parse_column_name("c+1", 2), None);
        assert_eq!(parse_column_name("C0", 2), None);
    }

    #[test]
    fn schema_serializes_as_column_array() {
        let schema = SchemaDescriptor::from_columns([(CellKind::I32, false)]);
        assert_eq!(
            schema.to_json(),
            json!([{
                "ordinal": 0,
                "name": "c0",
                "data_type": "I32",
                "size": -1,
                "nullable": false,
                "is_key": false
            }])
        );
    }
}
