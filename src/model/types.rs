//! Abstract SQL types used for column metadata, reflection results, and
//! dialect-specific `CAST(... AS ...)` emission.
//!
//! This is the type vocabulary the compiler dispatches on when it needs to
//! know the *kind* of a column (e.g. to decide whether a `Granularity`
//! truncation should preserve `DATE` or widen to `TIMESTAMP`, or whether a
//! `/` division needs a decimal cast on Postgres). It is distinct from
//! [`crate::sql::types::DataType`], which models physical DDL column types;
//! this one models what `ExecutionDriver::reflect_columns` reports back
//! after mapping a dialect's native type-name string through a
//! `TypeNameMapping` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal(u8, u8),
    String,
    Char(u16),
    Varchar(u16),
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Binary,
    Json,
    Uuid,
    /// Reflection gap or a type the mapping table didn't recognize.
    Unknown,
}

impl DataType {
    /// Whether this type participates in datetime arithmetic (granularity
    /// truncation, interval addition, `diffSeconds`).
    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Time | DataType::Timestamp | DataType::TimestampTz)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::Float32
                | DataType::Float64
                | DataType::Decimal(_, _)
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, DataType::String | DataType::Char(_) | DataType::Varchar(_))
    }
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Unknown
    }
}
