//! `JoinOne`: compile the joined relation's own source chain under a
//! forked CTE-name prefix, then join it into the current statement
//! (spec.md §4.4, §4.2 "fork_cte_names").
//!
//! The joined side always finalizes to a CTE (`nested_layer.chained(..)`)
//! so it is addressable as a single aliased relation regardless of how
//! many operations its own chain folded; every CTE that produced is
//! pulled into the outer query alongside the base relation's own.

use crate::error::CompileError;
use crate::model::{ColumnExpression, Namespace};
use crate::sql::query::{JoinType, TableRef};

use crate::compile::column_expression;
use crate::compile::context::QueryContext;
use crate::compile::query_layer::{NamespaceBinding, QueryLayer};

pub fn compile(
    ctx: &QueryContext,
    mut layer: QueryLayer,
    relation: &Namespace,
    condition: &ColumnExpression,
    drop_unmatched: bool,
) -> Result<QueryLayer, CompileError> {
    if !layer.can_fold() {
        layer = layer.chained(ctx);
    }

    let joined_ctx = ctx.fork_cte_names(&relation.identifier);
    let nested_layer = super::source_compiler::compile(&joined_ctx, &relation.nested_model.source)?;
    let nested_layer = nested_layer.chained(&joined_ctx);

    let nested_alias = nested_layer.main_alias.clone();
    let nested_columns = nested_layer.main_columns.clone();
    for cte in nested_layer.query.with {
        layer.query = layer.query.with_cte(cte);
    }

    layer.bind_namespace(
        &relation.identifier,
        NamespaceBinding {
            alias: nested_alias.clone(),
            columns: nested_columns,
        },
    );

    let preprocessed = column_expression::preprocess(ctx, condition);
    let on_expr = column_expression::compile(ctx, &layer, &preprocessed, false)?;

    let identifier = relation.identifier.clone();
    let used = layer.used_namespaces_handle();
    // The ON-clause itself always references this namespace; that's not
    // evidence of a *downstream* reference, so undo the flag it just set.
    // Anything compiled after this point that genuinely reaches the
    // namespace (a `Pick` column, a later `Filter`, ...) will set it again
    // before `finalized()` runs.
    used.borrow_mut().remove(&identifier);

    // Unmatched rows on the joined side are kept unless the model asked
    // to drop them (spec.md §3 `JoinOne.drop_unmatched`).
    let join_type = if drop_unmatched { JoinType::Inner } else { JoinType::Left };
    let table_ref = TableRef::new(&nested_alias).with_alias(&nested_alias);

    // Defer the actual JOIN emission to finalization: only once every
    // downstream expression against this layer has compiled do we know
    // whether `relation.identifier` was ever referenced. An unreferenced
    // namespace emits no JOIN at all (spec.md §4.4, §8 "Join elision").
    layer.add_finalize_hook(Box::new(move |query| {
        if used.borrow().contains(&identifier) {
            *query = std::mem::take(query).join(join_type, table_ref, on_expr);
        }
    }));

    Ok(layer)
}
