use super::Unset;
use crate::table::{FieldMode, FieldType, TableFieldSchema};

/// Typestate builder for [`TableFieldSchema`]: a type has to be picked before
/// a mode, and picking the mode finishes the column.
#[derive(Debug, Clone, PartialEq)]
pub struct TableFieldSchemaBuilder<S, Ty> {
    name: S,
    ty: Ty,
    description: Option<S>,
}

impl<S> TableFieldSchemaBuilder<S, Unset> {
    pub(crate) const fn new(name: S) -> Self {
        Self {
            name,
            ty: Unset,
            description: None,
        }
    }
}

impl<S, Ty> TableFieldSchemaBuilder<S, Ty> {
    pub fn description(mut self, description: S) -> Self {
        self.description = Some(description);
        self
    }
}

macro_rules! define_ty_builder_fn {
    ($($name:ident($ty_variant:ident)),* $(,)?) => {
        $(
            #[inline]
            pub fn $name(self) -> TableFieldSchemaBuilder<S, FieldType> {
                self.with_type(FieldType::$ty_variant)
            }
        )*
    };
}

impl<S> TableFieldSchemaBuilder<S, Unset> {
    fn with_type(self, ty: FieldType) -> TableFieldSchemaBuilder<S, FieldType> {
        TableFieldSchemaBuilder {
            name: self.name,
            ty,
            description: self.description,
        }
    }

    define_ty_builder_fn! {
        string(String),
        bytes(Bytes),
        int(Integer),
        float(Float),
        bool(Bool),
        timestamp(Timestamp),
        date(Date),
        time(Time),
        datetime(DateTime),
        numeric(Numeric),
        json(Json),
        record(Record),
    }
}

macro_rules! define_mode_builder_fn {
    ($($name:ident($mode_variant:ident)),* $(,)?) => {
        $(
            #[inline]
            pub fn $name(self) -> TableFieldSchema<S> {
                self.build_with_mode(FieldMode::$mode_variant)
            }
        )*
    };
}

impl<S> TableFieldSchemaBuilder<S, FieldType> {
    fn build_with_mode(self, mode: FieldMode) -> TableFieldSchema<S> {
        let mut field = TableFieldSchema::new(self.name, self.ty, mode);
        field.description = self.description;
        field
    }

    define_mode_builder_fn! {
        required(Required),
        repeated(Repeated),
        nullable(Nullable),
    }
}
