//! `Aggregate`: fold the GROUP BY/measures into the current statement when
//! possible, else open a fresh layer first (spec.md §4.4).
//!
//! Folding resets the layer's column metadata to exactly
//! `groups ++ measures`, mirroring `Model::with_aggregate`'s own map reset
//! (spec.md §3 "Aggregate").

use crate::error::CompileError;
use crate::execution_driver::ColumnTypeMap;
use crate::model::ColumnExpression;
use crate::sql::dialect::Dialect;
use crate::sql::query::SelectExpr;

use crate::compile::column_expression;
use crate::compile::context::QueryContext;
use crate::compile::query_layer::QueryLayer;

pub fn compile(
    ctx: &QueryContext,
    mut layer: QueryLayer,
    groups: &[ColumnExpression],
    measures: &[ColumnExpression],
) -> Result<QueryLayer, CompileError> {
    if !layer.can_fold() || layer.is_aggregated {
        layer = layer.chained(ctx);
    }

    let mut select = Vec::with_capacity(groups.len() + measures.len());
    let mut group_by = Vec::with_capacity(groups.len());
    let mut new_columns = ColumnTypeMap::new();

    for g in groups {
        let preprocessed = column_expression::preprocess(ctx, g);
        let compiled = column_expression::compile(ctx, &layer, &preprocessed, false)?;
        let id = preprocessed.effective_identifier().unwrap_or_default();
        let ty = layer.column_type(None, &id);
        new_columns.insert(id.clone(), ty);
        select.push(SelectExpr::new(compiled.clone()).with_alias(&id));
        // ClickHouse groups by the rendered column name; every other
        // dialect we target groups by the SELECT list's positional index,
        // which sidesteps re-deriving the exact same expression text twice.
        if ctx.dialect == Dialect::ClickHouse {
            group_by.push(crate::sql::expr::col(&id));
        } else {
            group_by.push(crate::sql::expr::lit_int((group_by.len() + 1) as i64));
        }
    }

    for m in measures {
        let preprocessed = column_expression::preprocess(ctx, m);
        let compiled = column_expression::compile(ctx, &layer, &preprocessed, false)?;
        let id = preprocessed.effective_identifier().unwrap_or_default();
        new_columns.insert(id.clone(), crate::model::DataType::Unknown);
        select.push(SelectExpr::new(compiled).with_alias(&id));
    }

    layer.query = layer.query.select(select).group_by(group_by);
    layer.main_columns = new_columns;
    layer.namespaces.clear();
    layer.is_aggregated = true;
    Ok(layer)
}
