//! The opaque Execution Driver collaborator (spec.md §6).
//!
//! Out of scope per spec.md §1 ("the in-process warehouse driver layer");
//! this module specifies only the interface the compiler calls into for
//! column reflection and (optional) execution. Shaped like the teacher's
//! own external-collaborator traits (`src/metadata/provider.rs`'s provider
//! trait). Modeled as a synchronous (non-async) trait: the `ExecutionDriver`
//! is a caller-supplied collaborator, not the teacher's `tokio`-based
//! worker-subprocess transport, which belongs to a different, out-of-scope
//! layer (spec.md §5).

use std::collections::BTreeMap;

use crate::error::ExecutionError;
use crate::model::{DataType, Source};
use crate::sql::Dialect;

/// One returned column's name and reported type code, mapped through a
/// per-dialect `TypeNameMapping` table into this crate's abstract
/// `DataType` vocabulary.
pub type ColumnTypeMap = BTreeMap<String, DataType>;

/// The tabular result of `execute()`. Row post-processing (duplicate-column
/// renaming, Arrow serialization) is out of scope (spec.md §1); rows are
/// passed through as loosely-typed JSON values.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub columns: Vec<(String, DataType)>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub duration_ms: u64,
}

/// The driver's interface (spec.md §6). A caller implements this however
/// it likes for its warehouse of choice; the core only ever calls through
/// the trait object.
pub trait ExecutionDriver {
    fn dialect(&self) -> Dialect;

    /// Reflect a source's output columns, typically by compiling
    /// `SELECT ... LIMIT 0` and mapping the returned type codes.
    fn reflect_columns(&self, source: &Source) -> Result<ColumnTypeMap, ExecutionError>;

    fn execute(&self, sql: &str) -> Result<ExecutionResult, ExecutionError>;
}

/// A driver that never executes anything; used for `sql_only` compilations
/// and in tests where only the generated SQL text matters.
#[derive(Debug, Clone, Copy)]
pub struct NullExecutionDriver(pub Dialect);

impl ExecutionDriver for NullExecutionDriver {
    fn dialect(&self) -> Dialect {
        self.0
    }

    fn reflect_columns(&self, _source: &Source) -> Result<ColumnTypeMap, ExecutionError> {
        Ok(ColumnTypeMap::new())
    }

    fn execute(&self, _sql: &str) -> Result<ExecutionResult, ExecutionError> {
        Err(ExecutionError::new(
            "NullExecutionDriver cannot execute; use Settings::sql_only for compile-only runs",
        ))
    }
}
