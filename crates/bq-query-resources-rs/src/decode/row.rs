use std::iter::Enumerate;
use std::slice::Iter;

use serde::de::value::StrDeserializer;
use serde::de::{self, DeserializeSeed, Visitor};

use super::cell::CellDeserializer;
use super::{DecodeError, DecodePlan};
use crate::row::TableCell;

/// Exposes a single row as a record. Assumes the row's cell count was already
/// checked against the plan.
pub(super) struct RowDeserializer<'p, 'a, 'de> {
    plan: &'p DecodePlan<'a>,
    index: usize,
    cells: &'de [TableCell],
}

impl<'p, 'a, 'de> RowDeserializer<'p, 'a, 'de> {
    pub(super) fn new(plan: &'p DecodePlan<'a>, index: usize, cells: &'de [TableCell]) -> Self {
        Self { plan, index, cells }
    }

    fn check_arity(&self, fields: usize) -> Result<(), DecodeError> {
        if fields == self.cells.len() {
            Ok(())
        } else {
            Err(DecodeError::ShapeMismatch {
                row: self.index,
                cells: self.cells.len(),
                fields,
            })
        }
    }

    fn into_access(self, keys: Keys) -> CellAccess<'p, 'a, 'de> {
        CellAccess {
            plan: self.plan,
            cells: self.cells.iter().enumerate(),
            keys,
            pending: None,
        }
    }
}

impl<'de> de::Deserializer<'de> for RowDeserializer<'_, '_, 'de> {
    type Error = DecodeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(self.into_access(Keys::Columns))
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.check_arity(fields.len())?;
        visitor.visit_map(self.into_access(Keys::Fields(fields)))
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(self.into_access(Keys::Columns))
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.check_arity(len)?;
        visitor.visit_seq(self.into_access(Keys::Columns))
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_tuple(len, visitor)
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

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct enum identifier
    }
}

#[derive(Debug, Clone, Copy)]
enum Keys {
    /// Destination struct field names, bound to cells by position.
    Fields(&'static [&'static str]),
    Columns,
}

/// Walks the cells of a row, as either a map or a sequence.
struct CellAccess<'p, 'a, 'de> {
    plan: &'p DecodePlan<'a>,
    cells: Enumerate<Iter<'de, TableCell>>,
    keys: Keys,
    pending: Option<(usize, &'de TableCell)>,
}

impl<'de> CellAccess<'_, '_, 'de> {
    fn cell_deserializer(&self, index: usize, cell: &'de TableCell) -> CellDeserializer<'_, '_, 'de> {
        CellDeserializer::new(self.plan.column(index), &cell.v)
    }
}

impl<'de> de::MapAccess<'de> for CellAccess<'_, '_, 'de> {
    type Error = DecodeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        let Some((index, cell)) = self.cells.next() else {
            return Ok(None);
        };

        self.pending = Some((index, cell));

        let key = match self.keys {
            Keys::Fields(fields) => fields[index],
            Keys::Columns => self.plan.column(index).name,
        };

        seed.deserialize(StrDeserializer::<DecodeError>::new(key))
            .map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let (index, cell) = self
            .pending
            .take()
            .ok_or_else(|| <DecodeError as de::Error>::custom("value requested before its key"))?;

        seed.deserialize(self.cell_deserializer(index, cell))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.cells.len())
    }
}

impl<'de> de::SeqAccess<'de> for CellAccess<'_, '_, 'de> {
    type Error = DecodeError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.cells.next() {
            Some((index, cell)) => seed.deserialize(self.cell_deserializer(index, cell)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.cells.len())
    }
}
