//! Tabular row batches consumed by the graphload ingestion core.
//!
//! Source connectors (files, tables, graph databases, streams) hand the core
//! their data as [`ColumnBatch`]es. The core only needs two things from a row:
//! lookup of a field by name and introspection of the field's declared type,
//! both exposed through [`RowRef`].
//!
//! Columns are typed `Vec<Option<T>>`s behind the [`Column`] enum, and a
//! batch can be cut into contiguous partitions with [`ColumnBatch::split`].

pub mod batch;
pub mod error;
pub mod row;

pub use batch::{BatchSchema, Column, ColumnBatch, FieldInfo, FieldType};
pub use error::{Result, TabularError};
pub use row::{RowRef, ScalarRef};
