//! `Union`: combine two independently-finalized branches into one compound
//! SELECT, then always chain to give the combined row set a stable,
//! namespace-free base for further operations (spec.md §4.4).

use crate::error::CompileError;
use crate::model::Source;

use crate::compile::context::QueryContext;
use crate::compile::query_layer::QueryLayer;

pub fn compile(ctx: &QueryContext, base: &Source, other: &Source) -> Result<QueryLayer, CompileError> {
    let mut left = super::source_compiler::compile(ctx, base)?;
    let mut right = super::source_compiler::compile(ctx, other)?;
    left.finalized();
    right.finalized();

    let combined_columns = left.main_columns.clone();
    let set_op = left.query.union_all(right.query);

    let mut union_layer = QueryLayer::from_table(
        &ctx.next_alias_name("union"),
        crate::sql::query::TableRef::new("__union__"),
        combined_columns,
    );
    union_layer.query = crate::sql::query::Query::new();
    union_layer.query.set_op = Some(Box::new(set_op));

    Ok(union_layer.chained(ctx))
}
