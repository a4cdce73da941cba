//! `Pick`: fold into the SELECT list when possible (spec.md §4.4).

use std::collections::{BTreeSet, HashSet};

use crate::error::CompileError;
use crate::model::ColumnExpression;

use crate::compile::column_expression;
use crate::compile::context::QueryContext;
use crate::compile::query_layer::QueryLayer;

pub fn compile(ctx: &QueryContext, mut layer: QueryLayer, columns: &[ColumnExpression]) -> Result<QueryLayer, CompileError> {
    let picked_names: BTreeSet<&str> = columns.iter().filter_map(|c| c.manually_set_identifier()).collect();
    let existing_names: HashSet<&str> = layer.main_columns.keys().map(String::as_str).collect();
    if !picked_names.is_empty() && picked_names.iter().all(|n| existing_names.contains(n)) && picked_names.len() == existing_names.len() {
        // No-op: selection set equals the base's column set.
        return Ok(layer);
    }

    if !layer.can_fold() {
        layer = layer.chained(ctx);
    }

    let mut select = Vec::with_capacity(columns.len());
    let mut new_columns = crate::execution_driver::ColumnTypeMap::new();
    for c in columns {
        let preprocessed = column_expression::preprocess(ctx, c);
        let compiled = column_expression::compile(ctx, &layer, &preprocessed, false)?;
        match preprocessed.effective_identifier() {
            Some(id) if !preprocessed.is_star() => {
                let ty = layer.column_type(None, &id);
                new_columns.insert(id.clone(), ty);
                select.push(crate::sql::query::SelectExpr::new(compiled).with_alias(&id));
            }
            _ => select.push(crate::sql::query::SelectExpr::new(compiled)),
        }
    }

    layer.query = layer.query.select(select);
    layer.main_columns = new_columns;
    Ok(layer)
}
