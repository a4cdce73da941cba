//! AWS Athena SQL dialect (Trino/Presto engine).
//!
//! Athena features:
//! - ANSI identifier quoting (`"`)
//! - `INTERVAL 'N' UNIT` (quantity-quoted) interval literal syntax, unlike
//!   every other dialect here
//! - Native `UNNEST` for array expansion, no `ANY`/array-contains sugar
//! - No MERGE, no RETURNING, no native PIVOT

use super::helpers;
use super::SqlDialect;

/// AWS Athena SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Athena;

impl SqlDialect for Athena {
    fn name(&self) -> &'static str {
        "athena"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn supports_distinct_on(&self) -> bool {
        false
    }

    fn supports_aggregate_filter(&self) -> bool {
        true
    }

    fn supports_groups_frame(&self) -> bool {
        false
    }

    fn supports_named_windows(&self) -> bool {
        false
    }

    fn supports_qualify(&self) -> bool {
        false
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn supports_merge(&self) -> bool {
        false
    }

    fn supports_truncate(&self) -> bool {
        false
    }

    fn supports_truncate_cascade(&self) -> bool {
        false
    }

    fn supports_materialized_view(&self) -> bool {
        false
    }

    fn supports_create_or_replace_view(&self) -> bool {
        true
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_athena(name)
    }

    fn emit_data_type(&self, dt: &crate::model::types::DataType) -> String {
        helpers::emit_data_type_athena(dt)
    }
}
