use serde::de::value::{BorrowedStrDeserializer, MapDeserializer, SeqDeserializer};
use serde::de::{self, Visitor};

use super::timestamp::parse_exponential_timestamp;
use super::{ColumnKind, ColumnPlan, DecodeError};
use crate::row::CellValue;

macro_rules! deserialize_integers {
    ($($method:ident),* $(,)?) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, Self::Error>
            where
                V: Visitor<'de>,
            {
                self.deserialize_integer(visitor)
            }
        )*
    };
}

/// Hands a single cell to a visitor, according to its column's [`ColumnKind`].
pub(super) struct CellDeserializer<'p, 'a, 'de> {
    column: &'p ColumnPlan<'a>,
    cell: &'de CellValue,
}

impl<'p, 'a, 'de> CellDeserializer<'p, 'a, 'de> {
    pub(super) fn new(column: &'p ColumnPlan<'a>, cell: &'de CellValue) -> Self {
        Self { column, cell }
    }

    /// The raw text of the cell, [`None`] if null.
    fn text(&self) -> Result<Option<&'de str>, DecodeError> {
        match self.cell {
            CellValue::Null => Ok(None),
            _ if self.column.kind == ColumnKind::Unsupported => Err(self.column.unsupported()),
            CellValue::Text(text) => Ok(Some(&**text)),
            CellValue::Nested(_) => Err(self
                .column
                .invalid_value("<nested>", "nested values only appear in RECORD or REPEATED columns")),
        }
    }

    fn parse_integer(&self, raw: &str) -> Result<i128, DecodeError> {
        match self.column.kind {
            ColumnKind::Integer => raw
                .parse::<i128>()
                .map_err(|error| self.column.invalid_value(raw, error)),
            ColumnKind::Timestamp => parse_exponential_timestamp(raw).map(i128::from),
            _ => Err(self.column.type_mismatch("an integer")),
        }
    }

    fn deserialize_integer<V>(self, visitor: V) -> Result<V::Value, DecodeError>
    where
        V: Visitor<'de>,
    {
        let Some(raw) = self.text()? else {
            return visitor.visit_i64(0);
        };

        let value = self.parse_integer(raw)?;
        visit_integer(value, visitor).map_err(|error| self.column.contextualize(raw, error))
    }

    fn deserialize_float<V>(self, visitor: V) -> Result<V::Value, DecodeError>
    where
        V: Visitor<'de>,
    {
        let Some(raw) = self.text()? else {
            return visitor.visit_f64(0.0);
        };

        if self.column.kind != ColumnKind::Float {
            return Err(self.column.type_mismatch("a float"));
        }

        let value = raw
            .parse::<f64>()
            .map_err(|error| self.column.invalid_value(raw, error))?;

        visitor
            .visit_f64(value)
            .map_err(|error| self.column.contextualize(raw, error))
    }

    fn text_of_kind(&self, expected: &'static str) -> Result<Option<&'de str>, DecodeError> {
        match self.text()? {
            Some(_) if self.column.kind != ColumnKind::Text => Err(self.column.type_mismatch(expected)),
            text => Ok(text),
        }
    }
}

fn visit_integer<'de, V>(value: i128, visitor: V) -> Result<V::Value, DecodeError>
where
    V: Visitor<'de>,
{
    if let Ok(value) = i64::try_from(value) {
        visitor.visit_i64(value)
    } else if let Ok(value) = u64::try_from(value) {
        visitor.visit_u64(value)
    } else {
        visitor.visit_i128(value)
    }
}

#[inline]
fn parse_bool(raw: &str) -> bool {
    matches!(raw, "true" | "1")
}

impl<'de> de::Deserializer<'de> for CellDeserializer<'_, '_, 'de> {
    type Error = DecodeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let Some(raw) = self.text()? else {
            return visitor.visit_unit();
        };

        let result = match self.column.kind {
            ColumnKind::Text => visitor.visit_borrowed_str(raw),
            ColumnKind::Boolean => visitor.visit_bool(parse_bool(raw)),
            ColumnKind::Float => return self.deserialize_float(visitor),
            ColumnKind::Integer | ColumnKind::Timestamp => {
                visit_integer(self.parse_integer(raw)?, visitor)
            }
            ColumnKind::Unsupported => return Err(self.column.unsupported()),
        };

        result.map_err(|error| self.column.contextualize(raw, error))
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.text()? {
            None => visitor.visit_bool(false),
            Some(raw) if self.column.kind == ColumnKind::Boolean => {
                visitor.visit_bool(parse_bool(raw))
            }
            Some(_) => Err(self.column.type_mismatch("a boolean")),
        }
    }

    deserialize_integers! {
        deserialize_i8,
        deserialize_i16,
        deserialize_i32,
        deserialize_i64,
        deserialize_i128,
        deserialize_u8,
        deserialize_u16,
        deserialize_u32,
        deserialize_u64,
        deserialize_u128,
    }

    fn deserialize_f32<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_float(visitor)
    }

    fn deserialize_f64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_float(visitor)
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.text_of_kind("a character")? {
            None => visitor.visit_char('\0'),
            Some(raw) => visitor
                .visit_borrowed_str(raw)
                .map_err(|error| self.column.contextualize(raw, error)),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let raw = self.text_of_kind("a string")?.unwrap_or_default();

        visitor
            .visit_borrowed_str(raw)
            .map_err(|error| self.column.contextualize(raw, error))
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let raw = self.text_of_kind("bytes")?.unwrap_or_default();
        visitor.visit_borrowed_bytes(raw.as_bytes())
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.cell.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.text()? {
            None => visitor.visit_unit(),
            Some(_) => Err(self.column.type_mismatch("a unit value")),
        }
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.text()? {
            None => visitor.visit_seq(SeqDeserializer::new(std::iter::empty::<()>())),
            // text kinds (BYTES included) can fill a `Vec<u8>`
            Some(raw) if self.column.kind == ColumnKind::Text => {
                let mut bytes = SeqDeserializer::new(raw.bytes());
                let value = visitor
                    .visit_seq(&mut bytes)
                    .map_err(|error| self.column.contextualize(raw, error))?;
                bytes.end()?;
                Ok(value)
            }
            Some(_) => Err(self.column.type_mismatch("a sequence")),
        }
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.text()? {
            None => visitor.visit_map(MapDeserializer::new(std::iter::empty::<((), ())>())),
            Some(_) => Err(self.column.type_mismatch("a record")),
        }
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.text_of_kind("an enum variant")? {
            None => Err(self
                .column
                .invalid_value("null", "null cells only decode into an Option<enum>")),
            Some(raw) => visitor
                .visit_enum(BorrowedStrDeserializer::<DecodeError>::new(raw))
                .map_err(|error| self.column.contextualize(raw, error)),
        }
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }
}
