//! ClickHouse SQL dialect.
//!
//! ClickHouse features:
//! - ANSI identifier quoting (`"`) with backtick also accepted; we emit `"`
//! - Native array types and `arrayJoin`/`groupArray`/`arrayStringConcat`
//! - No native MERGE/RETURNING/DISTINCT ON
//! - QUALIFY-less: window filtering goes through a subquery
//! - `LIMIT n OFFSET m` pagination, same as Postgres

use super::helpers;
use super::SqlDialect;

/// ClickHouse SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct ClickHouse;

impl SqlDialect for ClickHouse {
    fn name(&self) -> &'static str {
        "clickhouse"
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
        false
    }

    fn supports_groups_frame(&self) -> bool {
        false
    }

    fn supports_named_windows(&self) -> bool {
        true
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

    fn supports_truncate_cascade(&self) -> bool {
        false
    }

    fn supports_materialized_view(&self) -> bool {
        // Materialized views exist but have different semantics (insert
        // triggers, not queryable snapshots); don't claim ANSI-style support.
        false
    }

    fn supports_lateral(&self) -> bool {
        false
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_clickhouse(name)
    }

    fn emit_data_type(&self, dt: &crate::model::types::DataType) -> String {
        helpers::emit_data_type_clickhouse(dt)
    }
}
