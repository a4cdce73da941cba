//! Dispatch table over `Source`'s variants (spec.md §4.4), consulted by
//! every variant that wraps a nested relation (`JoinOne`'s joined side,
//! `Union`'s two branches, `Subquery` column expressions).
//!
//! Before compiling a leaf (`TableName`/`SqlText`), the alias-checkpoint
//! cache is consulted by the source's stable content hash - two identical
//! table scans anywhere in the same model (e.g. a self-join) read from the
//! same CTE/table alias rather than being planned twice (spec.md §4.2, §9).

use crate::error::CompileError;
use crate::model::Source;
use crate::sql::query::TableRef;

use super::super::context::QueryContext;
use super::super::query_layer::QueryLayer;
use super::{aggregate, filter, join_one, limit, match_steps, pick, sort, sql_text, table_name, union};

pub fn compile(ctx: &QueryContext, source: &Source) -> Result<QueryLayer, CompileError> {
    if matches!(source, Source::TableName { .. } | Source::SqlText { .. }) {
        if let Some(checkpoint) = ctx.get_alias_checkpoint(&source.stable_key()) {
            let table = TableRef::new(&checkpoint.alias).with_alias(&checkpoint.alias);
            return Ok(QueryLayer::from_table(&checkpoint.alias, table, checkpoint.column_metadata));
        }
    }

    let layer = match source {
        Source::TableName { table, schema } => table_name::compile(ctx, table, schema.as_deref())?,
        Source::SqlText { sql } => sql_text::compile(ctx, sql)?,
        Source::Pick { base, columns } => {
            let base_layer = compile(ctx, base)?;
            pick::compile(ctx, base_layer, columns)?
        }
        Source::Filter { base, condition } => {
            let base_layer = compile(ctx, base)?;
            filter::compile(ctx, base_layer, condition)?
        }
        Source::Sort { base, sort, dir, .. } => {
            let base_layer = compile(ctx, base)?;
            sort::compile(ctx, base_layer, sort, *dir)?
        }
        Source::Limit { base, limit: lim, offset } => {
            let base_layer = compile(ctx, base)?;
            limit::compile(base_layer, *lim, *offset)?
        }
        Source::Aggregate { base, groups, measures } => {
            let base_layer = compile(ctx, base)?;
            aggregate::compile(ctx, base_layer, groups, measures)?
        }
        Source::JoinOne {
            base,
            relation,
            condition,
            drop_unmatched,
        } => {
            let base_layer = compile(ctx, base)?;
            join_one::compile(ctx, base_layer, relation, condition, *drop_unmatched)?
        }
        Source::Union { base, other } => union::compile(ctx, base, other)?,
        Source::MatchSteps {
            base,
            activity_schema,
            steps,
            partition_start_events,
            time_limit_seconds,
        } => match_steps::compile(ctx, base, activity_schema, steps, partition_start_events, *time_limit_seconds)?,
    };

    if matches!(source, Source::TableName { .. } | Source::SqlText { .. }) {
        ctx.add_alias_checkpoint(
            &source.stable_key(),
            crate::compile::context::AliasCheckpoint {
                alias: layer.main_alias.clone(),
                column_metadata: layer.main_columns.clone(),
            },
        );
    }

    Ok(layer)
}

/// Alias used by `column_expression`'s `Subquery` case, which sits outside
/// `compile::source` and addresses this dispatcher through `compile::`
/// directly (re-exported in `compile::mod`).
pub fn compile_source(ctx: &QueryContext, source: &Source) -> Result<QueryLayer, CompileError> {
    compile(ctx, source)
}
