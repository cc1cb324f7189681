//! Decoding [`TableRow`]s into caller types, driven by a page's [`TableSchema`].
//!
//! Each row is exposed to `serde` as a record whose fields are its cells, in
//! column order. Struct fields bind to cells by position, not by name, so a
//! destination struct must declare exactly as many fields as the row has cells.
//! Maps (and [`serde::de::Deserializer::deserialize_any`]) instead see the column
//! names as keys.
//!
//! Null cells decode to the zero value of the requested type, i.e. `""`, `0`,
//! `0.0`, `false` or `None`.
//!
//! Arity is checked twice per row. A row whose cell count differs from the
//! schema's column count fails with [`DecodeError::SchemaMismatch`] before the
//! destination is looked at, so [`DecodeError::ShapeMismatch`] (cells versus
//! destination fields) is only reported for rows that match their schema.
use std::fmt;

use serde::Deserialize;

use crate::row::TableRow;
use crate::table::{FieldMode, FieldType, TableSchema};

mod cell;
mod row;
mod timestamp;

pub use timestamp::parse_exponential_timestamp;

use self::row::RowDeserializer;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("row {row} has {cells} cells, but the destination record has {fields} fields")]
    ShapeMismatch {
        row: usize,
        cells: usize,
        fields: usize,
    },
    #[error("row {row} has {cells} cells, but the schema has {columns} columns")]
    SchemaMismatch {
        row: usize,
        cells: usize,
        columns: usize,
    },
    #[error("column '{column}' of type {column_type} can't be decoded into {expected}")]
    TypeMismatch {
        column: Box<str>,
        column_type: FieldType,
        expected: &'static str,
    },
    #[error("column '{column}' has unsupported type {column_type}")]
    UnsupportedType {
        column: Box<str>,
        column_type: Box<str>,
    },
    #[error("invalid timestamp literal '{0}'")]
    InvalidTimestampFormat(Box<str>),
    #[error("column '{column}' has an invalid {column_type} value '{value}': {reason}")]
    InvalidValue {
        column: Box<str>,
        column_type: FieldType,
        value: Box<str>,
        reason: Box<str>,
    },
    #[error("page contains rows, but no schema to decode them with")]
    MissingSchema,
    #[error("{0}")]
    Custom(Box<str>),
}

impl serde::de::Error for DecodeError {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self::Custom(msg.to_string().into_boxed_str())
    }
}

/// How the cells of a column get handed to a visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Passed through as a string, no validation.
    Text,
    Integer,
    Float,
    Boolean,
    /// Exponent notation epoch seconds, decoded to epoch milliseconds.
    Timestamp,
    /// RECORD, RANGE and REPEATED columns. Only null cells decode.
    Unsupported,
}

impl ColumnKind {
    pub const fn for_field(ty: FieldType, mode: FieldMode) -> Self {
        if matches!(mode, FieldMode::Repeated) {
            return Self::Unsupported;
        }

        match ty {
            FieldType::Integer => Self::Integer,
            FieldType::Float => Self::Float,
            FieldType::Bool => Self::Boolean,
            FieldType::Timestamp => Self::Timestamp,
            FieldType::Record | FieldType::Range => Self::Unsupported,
            FieldType::String
            | FieldType::Bytes
            | FieldType::Date
            | FieldType::Time
            | FieldType::DateTime
            | FieldType::Geography
            | FieldType::Numeric
            | FieldType::BigNumeric
            | FieldType::Json
            | FieldType::Interval => Self::Text,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnPlan<'a> {
    pub(crate) name: &'a str,
    pub(crate) ty: FieldType,
    pub(crate) mode: FieldMode,
    pub(crate) kind: ColumnKind,
}

impl ColumnPlan<'_> {
    pub(crate) fn type_mismatch(&self, expected: &'static str) -> DecodeError {
        DecodeError::TypeMismatch {
            column: self.name.into(),
            column_type: self.ty,
            expected,
        }
    }

    pub(crate) fn unsupported(&self) -> DecodeError {
        let column_type = match self.mode {
            FieldMode::Repeated => format!("{} {}", self.mode.as_str(), self.ty),
            _ => self.ty.to_string(),
        };

        DecodeError::UnsupportedType {
            column: self.name.into(),
            column_type: column_type.into_boxed_str(),
        }
    }

    pub(crate) fn invalid_value(&self, value: &str, reason: impl fmt::Display) -> DecodeError {
        DecodeError::InvalidValue {
            column: self.name.into(),
            column_type: self.ty,
            value: value.into(),
            reason: reason.to_string().into_boxed_str(),
        }
    }

    /// Attaches this column to a bare error raised by a visitor.
    pub(crate) fn contextualize(&self, value: &str, error: DecodeError) -> DecodeError {
        match error {
            DecodeError::Custom(reason) => self.invalid_value(value, reason),
            other => other,
        }
    }
}

/// The per-column decoding strategy for one schema. Built once per page and
/// reused for every row in it.
#[derive(Debug, Clone)]
pub struct DecodePlan<'a> {
    columns: Box<[ColumnPlan<'a>]>,
}

impl<'a> DecodePlan<'a> {
    pub fn new<S>(schema: &'a TableSchema<S>) -> Self
    where
        S: AsRef<str>,
    {
        let columns = schema
            .fields
            .iter()
            .map(|field| ColumnPlan {
                name: field.name.as_ref(),
                ty: field.ty,
                mode: field.mode,
                kind: ColumnKind::for_field(field.ty, field.mode),
            })
            .collect();

        Self { columns }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn kinds(&self) -> impl ExactSizeIterator<Item = ColumnKind> + '_ {
        self.columns.iter().map(|column| column.kind)
    }

    pub(crate) fn column(&self, index: usize) -> &ColumnPlan<'a> {
        &self.columns[index]
    }

    /// Decodes a single row. `index` is only used for error reporting. The
    /// row is checked against the schema first, then against the destination.
    pub fn decode_row<'de, T>(&self, index: usize, row: &'de TableRow) -> Result<T, DecodeError>
    where
        T: Deserialize<'de>,
    {
        if row.len() != self.columns.len() {
            return Err(DecodeError::SchemaMismatch {
                row: index,
                cells: row.len(),
                columns: self.columns.len(),
            });
        }

        T::deserialize(RowDeserializer::new(self, index, row.cells()))
    }
}

/// Decodes every row in `rows` against `schema`. Stops at the first row that fails.
pub fn decode_rows<'de, S, T>(
    schema: &TableSchema<S>,
    rows: &'de [TableRow],
) -> Result<Vec<T>, DecodeError>
where
    S: AsRef<str>,
    T: Deserialize<'de>,
{
    let plan = DecodePlan::new(schema);

    rows.iter()
        .enumerate()
        .map(|(index, row)| plan.decode_row(index, row))
        .collect()
}

/// Like [`decode_rows`], but replaces the contents of `dst`, which is left as-is on error.
pub fn decode_into<'de, S, T>(
    schema: &TableSchema<S>,
    rows: &'de [TableRow],
    dst: &mut Vec<T>,
) -> Result<(), DecodeError>
where
    S: AsRef<str>,
    T: Deserialize<'de>,
{
    *dst = decode_rows(schema, rows)?;
    Ok(())
}
