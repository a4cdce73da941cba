//! `Sort`: always folds, marks the layer order-dependent (spec.md §4.4).

use crate::error::CompileError;
use crate::model::{ColumnExpression, SortDir};
use crate::sql::query::OrderByExpr;

use crate::compile::column_expression;
use crate::compile::context::QueryContext;
use crate::compile::query_layer::QueryLayer;

pub fn compile(ctx: &QueryContext, mut layer: QueryLayer, sort: &ColumnExpression, dir: SortDir) -> Result<QueryLayer, CompileError> {
    let preprocessed = column_expression::preprocess(ctx, sort);
    let compiled = column_expression::compile(ctx, &layer, &preprocessed, false)?;

    let order = match dir {
        SortDir::Asc => OrderByExpr::asc(compiled),
        SortDir::Desc => OrderByExpr::desc(compiled),
    };
    let mut order_by = layer.query.order_by.clone();
    order_by.push(order);
    layer.query = layer.query.order_by(order_by);
    layer.has_order_by = true;
    Ok(layer)
}
