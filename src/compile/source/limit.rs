//! `Limit`: always folds, marks the layer order-dependent (spec.md §4.4).

use crate::error::CompileError;

use crate::compile::query_layer::QueryLayer;

pub fn compile(mut layer: QueryLayer, limit: Option<u64>, offset: Option<u64>) -> Result<QueryLayer, CompileError> {
    if let Some(limit) = limit {
        layer.query = layer.query.limit(limit);
    }
    if let Some(offset) = offset {
        layer.query = layer.query.offset(offset);
    }
    layer.has_limit = true;
    Ok(layer)
}
