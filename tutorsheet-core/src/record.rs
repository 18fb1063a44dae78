//! Records as returned by the data-access layer.
//!
//! Cell values stay strings. Dates, numbers and flags are the consumer's
//! business.

use crate::normalize::compact_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Wire name of the row marker field.
pub const ROW_INDEX_FIELD: &str = "_rowIndex";
/// Wire name of the client-local id field.
pub const LOCAL_ID_FIELD: &str = "_id";
/// Server-managed timestamp column.
pub const TIMESTAMP_FIELD: &str = "Timestamp";

/// Fields never sent back to the server on writes.
pub const RESERVED_FIELDS: [&str; 3] = [LOCAL_ID_FIELD, ROW_INDEX_FIELD, TIMESTAMP_FIELD];

/// Column name to cell value.
pub type Fields = BTreeMap<String, String>;

/// 1-based position of a record in its sheet. Row 1 is the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowPosition(u32);

impl RowPosition {
    pub const HEADER: RowPosition = RowPosition(1);
    pub const FIRST_DATA: RowPosition = RowPosition(2);

    pub fn new(row: u32) -> Self {
        Self(row)
    }

    /// Position of the `index`-th data row (0-based) under a single header row.
    pub fn from_data_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX - 2).saturating_add(2))
    }

    /// Parse a marker as the server or an old form sends it ("12", "12.0").
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(row) = raw.parse::<u32>() {
            return Some(Self(row));
        }
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0 && *v <= u32::MAX as f64)
            .map(|v| Self(v as u32))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Only data rows can be updated or deleted.
    pub fn is_mutable(&self) -> bool {
        self.0 >= 2
    }
}

impl fmt::Display for RowPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of a dataset plus its synthetic identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_rowIndex")]
    pub row: RowPosition,
    #[serde(rename = "_id")]
    pub local_id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn new(row: RowPosition, local_id: impl Into<String>, fields: Fields) -> Self {
        Self {
            row,
            local_id: local_id.into(),
            fields,
        }
    }

    /// Exact lookup.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Lookup that tolerates header drift: exact key first, then any column
    /// whose compact form equals the label's. Empty values count as missing.
    pub fn get_fuzzy(&self, label: &str) -> Option<&str> {
        if let Some(value) = self.get(label).filter(|v| !v.is_empty()) {
            return Some(value);
        }
        let wanted = compact_key(label);
        self.fields
            .iter()
            .find(|(key, value)| !value.is_empty() && compact_key(key) == wanted)
            .map(|(_, value)| value.as_str())
    }
}

/// Fresh client-local id. Unique within a process, not stable across fetches.
pub fn new_local_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::now_v7().simple())
}

/// Copy of `fields` without the reserved synthetic/server-managed columns.
pub fn strip_reserved(fields: &Fields) -> Fields {
    fields
        .iter()
        .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
