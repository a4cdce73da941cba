//! Leaf: a raw SQL body wrapped as a CTE (spec.md §4.4 "SqlText").

use crate::error::CompileError;
use crate::execution_driver::ColumnTypeMap;
use crate::sql::query::TableRef;

use crate::compile::context::QueryContext;
use crate::compile::query_layer::QueryLayer;

pub fn compile(ctx: &QueryContext, sql: &str) -> Result<QueryLayer, CompileError> {
    // The raw body's own identifiers must never be shadowed by a generated
    // alias; reserve the whole text as a substring match.
    ctx.add_reserved_name(sql.to_string(), true);

    let alias = ctx.next_cte_name();
    let columns: ColumnTypeMap = match &ctx.driver {
        Some(driver) => driver
            .reflect_columns(&crate::model::Source::SqlText { sql: sql.to_string() })
            .map_err(CompileError::from)?,
        None => ColumnTypeMap::new(),
    };

    let layer = QueryLayer::from_table(&alias, TableRef::new(sql).with_alias(&alias), columns);
    Ok(layer.chained(ctx))
}
