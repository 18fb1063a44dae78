//! Tutorsheet Core - Dataset Types and Pure Transformations
//!
//! Types shared by every other crate: the dataset registry, records and
//! their row markers, the error taxonomy, and the pure pieces of the read
//! path (header normalization, CSV parsing, schema reconciliation).
//! No I/O lives here.

pub mod csv;
pub mod dataset;
pub mod error;
pub mod normalize;
pub mod reconcile;
pub mod record;

pub use csv::parse_delimited;
pub use dataset::{DatasetKey, DatasetSource};
pub use error::{
    ConfigError, ResponseError, SheetError, SheetResult, TransportError, ValidationError,
};
pub use normalize::{compact_key, keys_match, normalize_key};
pub use reconcile::{aliases_for, normalize_fields, reconcile, FieldAlias};
pub use record::{
    new_local_id, strip_reserved, Fields, Record, RowPosition, LOCAL_ID_FIELD, RESERVED_FIELDS,
    ROW_INDEX_FIELD, TIMESTAMP_FIELD,
};
