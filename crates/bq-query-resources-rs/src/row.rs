//! Rows as returned by the query endpoints: `{"f": [{"v": ...}, ...]}`.
use serde::de;

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

impl TableRow {
    pub const fn new(cells: Vec<TableCell>) -> Self {
        Self { f: cells }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.f.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.f.is_empty()
    }

    #[inline]
    pub fn cells(&self) -> &[TableCell] {
        &self.f
    }
}

impl<C: Into<CellValue>> FromIterator<C> for TableRow {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self {
            f: iter
                .into_iter()
                .map(|value| TableCell { v: value.into() })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TableCell {
    #[serde(default)]
    pub v: CellValue,
}

impl TableCell {
    pub const NULL: Self = Self { v: CellValue::Null };

    pub fn text(value: impl Into<Box<str>>) -> Self {
        Self {
            v: CellValue::Text(value.into()),
        }
    }
}

/// The opaque value of a single cell.
///
/// Scalars always arrive as strings. Nested payloads (RECORD and REPEATED
/// columns) are kept as-is, since they have no textual decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Null,
    Text(Box<str>),
    Nested(serde_json::Value),
}

impl CellValue {
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value.into_boxed_str())
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl serde::Serialize for CellValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(text) => serializer.serialize_str(text),
            Self::Nested(value) => value.serialize(serializer),
        }
    }
}

impl<'de> serde::Deserialize<'de> for CellValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(CellValueVisitor)
    }
}

struct CellValueVisitor;

impl<'de> de::Visitor<'de> for CellValueVisitor {
    type Value = CellValue;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a string, null, or a nested record/array value")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(CellValue::Null)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(CellValue::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(CellValue::Text(v.into()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(CellValue::Text(v.into_boxed_str()))
    }

    // emulators sometimes send scalars unquoted, keep them textual
    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(CellValue::Text(if v { "true" } else { "false" }.into()))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(CellValue::Text(v.to_string().into_boxed_str()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(CellValue::Text(v.to_string().into_boxed_str()))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(CellValue::Text(v.to_string().into_boxed_str()))
    }

    fn visit_seq<A>(self, seq: A) -> Result<Self::Value, A::Error>
    where
        A: de::SeqAccess<'de>,
    {
        serde::Deserialize::deserialize(de::value::SeqAccessDeserializer::new(seq))
            .map(CellValue::Nested)
    }

    fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
    where
        A: de::MapAccess<'de>,
    {
        serde::Deserialize::deserialize(de::value::MapAccessDeserializer::new(map))
            .map(CellValue::Nested)
    }
}
