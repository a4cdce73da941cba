//! `Filter`: always folds into `WHERE`, or `HAVING` once aggregated
//! (spec.md §4.4).

use crate::error::CompileError;
use crate::model::ColumnExpression;

use crate::compile::column_expression;
use crate::compile::context::QueryContext;
use crate::compile::query_layer::QueryLayer;

pub fn compile(ctx: &QueryContext, mut layer: QueryLayer, condition: &ColumnExpression) -> Result<QueryLayer, CompileError> {
    let preprocessed = column_expression::preprocess(ctx, condition);
    let compiled = column_expression::compile(ctx, &layer, &preprocessed, false)?;

    layer.query = if layer.is_aggregated {
        layer.query.having(compiled)
    } else {
        layer.query.filter(compiled)
    };
    Ok(layer)
}
