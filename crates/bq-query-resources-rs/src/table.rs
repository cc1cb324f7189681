use std::fmt;

use crate::builders::Unset;
use crate::builders::table_field_schema::TableFieldSchemaBuilder;

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema<S = Box<str>> {
    // need to specify a default fn vec to avoid S needing Default
    #[serde(default = "Vec::new")]
    pub fields: Vec<TableFieldSchema<S>>,
}

impl<S> TableSchema<S> {
    pub const fn new(fields: Vec<TableFieldSchema<S>>) -> Self {
        Self { fields }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the column names, in column order.
    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> + '_
    where
        S: AsRef<str>,
    {
        self.fields.iter().map(|field| field.name.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFieldSchema<S = Box<str>> {
    pub name: S,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default)]
    pub mode: FieldMode,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub description: Option<S>,
    /// Sub-fields of a RECORD column.
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TableFieldSchema<S>>,
}

impl<S> TableFieldSchema<S> {
    pub const fn builder(name: S) -> TableFieldSchemaBuilder<S, Unset> {
        TableFieldSchemaBuilder::new(name)
    }

    pub const fn new(name: S, ty: FieldType, mode: FieldMode) -> Self {
        Self {
            name,
            ty,
            mode,
            description: None,
            fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Repeated,
    Required,
}

impl FieldMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nullable => "NULLABLE",
            Self::Repeated => "REPEATED",
            Self::Required => "REQUIRED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Bytes,
    #[serde(alias = "INT64")]
    Integer,
    #[serde(alias = "FLOAT64")]
    Float,
    #[serde(rename = "BOOLEAN", alias = "BOOL")]
    Bool,
    Timestamp,
    Date,
    Time,
    DateTime,
    Geography,
    Numeric,
    BigNumeric,
    Json,
    #[serde(alias = "STRUCT")]
    Record,
    Range,
    Interval,
}

impl FieldType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Bytes => "BYTES",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Bool => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "DATETIME",
            Self::Geography => "GEOGRAPHY",
            Self::Numeric => "NUMERIC",
            Self::BigNumeric => "BIGNUMERIC",
            Self::Json => "JSON",
            Self::Record => "RECORD",
            Self::Range => "RANGE",
            Self::Interval => "INTERVAL",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
