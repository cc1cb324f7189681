pub mod table_field_schema;

/// A builder slot that hasn't been filled in yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unset;
