//! Leaf: `SELECT * FROM t` (spec.md §4.4).

use crate::error::CompileError;
use crate::execution_driver::ColumnTypeMap;
use crate::sql::query::TableRef;

use crate::compile::context::QueryContext;
use crate::compile::query_layer::QueryLayer;

pub fn compile(ctx: &QueryContext, table: &str, schema: Option<&str>) -> Result<QueryLayer, CompileError> {
    let alias = ctx.next_alias_name(table);
    let mut table_ref = TableRef::new(table).with_alias(&alias);
    if let Some(schema) = schema {
        table_ref = table_ref.with_schema(schema);
    }

    let columns: ColumnTypeMap = match &ctx.driver {
        Some(driver) => driver
            .reflect_columns(&crate::model::Source::TableName {
                table: table.to_string(),
                schema: schema.map(str::to_string),
            })
            .map_err(CompileError::from)?,
        None => ColumnTypeMap::new(),
    };

    Ok(QueryLayer::from_table(&alias, table_ref, columns))
}
