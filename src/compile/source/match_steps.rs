//! `MatchSteps`: the funnel/step-matching algorithm (spec.md §4.6).
//!
//! Grounded 1:1 on
//! `original_source/src/run/compile/source/compilers/match_steps.py`. The
//! approach (credited there to
//! <https://medium.com/@pragya.deep19/4c521a75649>): label every event
//! matching any step with a one-character "step hash", concatenate each
//! group's events (ordered by time) into a "journey hash" string, then
//! regex-match the journey hash greedily against each step in turn to
//! recover the index of the event that satisfied it. The index arithmetic
//! (`LENGTH(hash) - LENGTH(regex_extract(remainder, step_hash + '.*')) + 1`)
//! avoids needing native regex *position* functions, which not every
//! dialect this crate targets has.

use crate::error::CompileError;
use crate::execution_driver::ColumnTypeMap;
use crate::model::{ActivitySchema, ColumnExpression, Literal, Source};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{col, func, lit_int, lit_str, row_number, star, table_col, Expr, ExprExt, WindowExt, WindowOrderBy};
use crate::sql::query::{Cte, JoinType, OrderByExpr, Query, SelectExpr, TableRef};

use crate::compile::column_expression;
use crate::compile::column_expression::intervals;
use crate::compile::context::QueryContext;
use crate::compile::query_layer::{NamespaceBinding, QueryLayer};
use crate::error::UserCompilationError;
use crate::model::IntervalUnit;

use super::source_compiler;

const TIMESTAMP_LABEL: &str = "__timestamp__";
const GROUP_LABEL: &str = "__group__";
const STEP_HASH_ID_LABEL: &str = "__step_hash_id__";
const EVENT_INDEX_LABEL: &str = "__event_index__";
const JOURNEY_HASH_LABEL: &str = "__journey_hash__";
const PARTITIONED_INDEX_LABEL: &str = "__partitioned_index__";

/// `A..Z`, `a..z`, `0..9`, in that order - the journey hash's `ORDER BY
/// ..., step_hash DESC` tie-break relies on this being standard ASCII
/// order so an earlier step always wins a tie against a later one.
const STEP_HASH_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn step_hash_char(index: usize) -> Result<char, CompileError> {
    STEP_HASH_ALPHABET
        .chars()
        .nth(index)
        .ok_or_else(|| UserCompilationError::TooManyMatchSteps.into())
}

fn step_event_index_column(index: usize) -> String {
    format!("step_{index}_event_index")
}

fn partition_label(expr: &ColumnExpression) -> String {
    let ident = expr.effective_identifier().unwrap_or_else(|| "key".to_string());
    let sanitized: String = ident
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("__partition_{sanitized}_key__")
}

/// The step-hash literal picked into each per-step labelled relation.
/// Redshift can't infer a usable type for a bare single-character literal
/// when it's the only one in the query (a single-step funnel), so it needs
/// an explicit cast.
fn step_hash_literal(index: usize, dialect: Dialect) -> Result<ColumnExpression, CompileError> {
    let ch = step_hash_char(index)?;
    let literal = ColumnExpression::str_lit(ch.to_string());
    Ok(if dialect == Dialect::Redshift {
        ColumnExpression::func("cast", vec![literal, ColumnExpression::str_lit("TEXT")])
    } else {
        literal
    })
}

pub fn compile(
    ctx: &QueryContext,
    base: &Source,
    activity_schema: &ActivitySchema,
    steps: &[ColumnExpression],
    partition_start_events: &[ColumnExpression],
    time_limit_seconds: Option<i64>,
) -> Result<QueryLayer, CompileError> {
    if steps.is_empty() {
        return Err(UserCompilationError::EmptyMatchSteps.into());
    }
    if steps.len() > STEP_HASH_ALPHABET.len() {
        return Err(UserCompilationError::TooManyMatchSteps.into());
    }

    let group_expr = &activity_schema.group;
    let timestamp_expr = &activity_schema.timestamp;
    let group_identifier = group_expr.effective_identifier().unwrap_or_else(|| "group".to_string());

    let enforce_time_limit_in_dedicated_cte = ctx.dialect == Dialect::ClickHouse;
    let can_fail_on_listagg_size_limit = ctx.dialect == Dialect::Redshift;

    let partition_labels: Vec<String> = partition_start_events.iter().map(partition_label).collect();

    // --- per-step labelled relations, unioned together --------------------
    let mut union_source: Option<Source> = None;
    for (index, step_condition) in steps.iter().enumerate() {
        let mut picked = vec![
            ColumnExpression::star(),
            step_hash_literal(index, ctx.dialect)?.named(STEP_HASH_ID_LABEL),
            group_expr.clone().named(GROUP_LABEL),
            timestamp_expr.clone().named(TIMESTAMP_LABEL),
        ];
        for (expr, label) in partition_start_events.iter().zip(partition_labels.iter()) {
            picked.push(expr.clone().named(label.clone()));
        }
        let labelled = base.clone().filter(step_condition.clone()).pick(picked);
        union_source = Some(match union_source {
            Some(acc) => acc.union(labelled),
            None => labelled,
        });
    }
    let union_source = union_source.expect("validated non-empty above");

    // --- events_layer: every labelled event plus its per-group order -----
    let mut events_layer = source_compiler::compile(ctx, &union_source)?;
    events_layer.finalized();
    let row_number_expr = row_number()
        .over()
        .partition_by(vec![col(GROUP_LABEL)])
        .order_by(vec![WindowOrderBy::asc(col(TIMESTAMP_LABEL))])
        .build();
    events_layer.query = events_layer
        .query
        .select(vec![SelectExpr::new(star()), SelectExpr::new(row_number_expr).with_alias(EVENT_INDEX_LABEL)]);
    let events_layer = events_layer.chained(ctx);
    let events_alias = events_layer.main_alias.clone();
    let events_columns = events_layer.main_columns.clone();
    let mut all_ctes: Vec<Cte> = events_layer.query.with.clone();

    // --- optional partition-by-first-matching-event CTEs ------------------
    let partition_alias = if partition_start_events.is_empty() {
        None
    } else {
        let partition_ctx = ctx.fork_cte_names("partition");
        let mut partition_by = vec![col(GROUP_LABEL)];
        for label in &partition_labels {
            // BigQuery disallows floating-point PARTITION BY columns; the
            // original casts those to NUMERIC, which needs the reflected
            // column type this layer doesn't carry for picked expressions.
            // Left uncast here (see DESIGN.md).
            partition_by.push(col(label));
        }
        let hash0 = step_hash_char(0)?;
        let windowed_expr = row_number()
            .over()
            .partition_by(partition_by)
            .order_by(vec![WindowOrderBy::asc(col(TIMESTAMP_LABEL))])
            .build();
        let windowed_query = Query::new()
            .select(vec![SelectExpr::new(star()), SelectExpr::new(windowed_expr).with_alias(PARTITIONED_INDEX_LABEL)])
            .from(TableRef::new(&events_alias).with_alias(&events_alias))
            .filter(col(STEP_HASH_ID_LABEL).eq(lit_str(&hash0.to_string())));
        let windowed_name = partition_ctx.next_cte_name();
        all_ctes.push(Cte::new(&windowed_name, windowed_query));

        let filtered_query = Query::new()
            .select(vec![SelectExpr::new(star())])
            .from(TableRef::new(&windowed_name).with_alias(&windowed_name))
            .filter(col(PARTITIONED_INDEX_LABEL).eq(lit_int(1)));
        let filtered_name = partition_ctx.next_cte_name();
        all_ctes.push(Cte::new(&filtered_name, filtered_query));
        Some(filtered_name)
    };

    // --- journey base: pre-sorted for ClickHouse, the raw events CTE else -
    let journey_base_alias = if ctx.dialect == Dialect::ClickHouse {
        let sorted_query = Query::new()
            .select(vec![SelectExpr::new(col(GROUP_LABEL)), SelectExpr::new(col(STEP_HASH_ID_LABEL)), SelectExpr::new(col(TIMESTAMP_LABEL))])
            .from(TableRef::new(&events_alias).with_alias(&events_alias))
            .order_by(vec![
                OrderByExpr::asc(col(GROUP_LABEL)),
                OrderByExpr::asc(col(TIMESTAMP_LABEL)),
                OrderByExpr::desc(col(STEP_HASH_ID_LABEL)),
            ]);
        let name = ctx.next_cte_name();
        all_ctes.push(Cte::new(&name, sorted_query));
        name
    } else {
        events_alias.clone()
    };

    // --- journeys: one row per group, holding its journey hash ------------
    let journeys_ctx = ctx.fork_cte_names("funnel");
    if can_fail_on_listagg_size_limit {
        ctx.register_exec_error_handler(Box::new(|message: &str| {
            if message.contains("Result size exceeds LISTAGG limit") {
                Some(
                    "Redshift LISTAGG size limit (65535) exceeded. Consider pre-filtering out \
                     entities with many matched events."
                        .to_string(),
                )
            } else {
                None
            }
        }));
    }

    let journeys_query = Query::new()
        .select(vec![
            SelectExpr::new(col(GROUP_LABEL)).with_alias(&group_identifier),
            SelectExpr::new(build_journey_hash(ctx.dialect)).with_alias(JOURNEY_HASH_LABEL),
        ])
        .from(TableRef::new(&journey_base_alias).with_alias(&journey_base_alias))
        .group_by(vec![col(GROUP_LABEL)]);
    let mut journeys_name = journeys_ctx.next_cte_name();
    all_ctes.push(Cte::new(&journeys_name, journeys_query));

    // One CTE per step, each adding its own `step_N_event_index` column on
    // top of the previous step's CTE (spec.md §4.6 step 6-8).
    for index in 0..steps.len() {
        let next_query = if index == 0 {
            if let Some(partition_alias) = &partition_alias {
                let event_index_ref = table_col(partition_alias, EVENT_INDEX_LABEL);
                let joined_event_index = if matches!(ctx.dialect, Dialect::Postgres | Dialect::Redshift) {
                    func("CAST", vec![event_index_ref, Expr::Raw("INTEGER".to_string())])
                } else {
                    event_index_ref
                };
                let mut select_cols = vec![
                    SelectExpr::new(table_col(&journeys_name, &group_identifier)),
                    SelectExpr::new(table_col(&journeys_name, JOURNEY_HASH_LABEL)),
                    SelectExpr::new(joined_event_index).with_alias(&step_event_index_column(0)),
                ];
                for label in &partition_labels {
                    select_cols.push(SelectExpr::new(table_col(partition_alias, label)).with_alias(label));
                }
                Query::new().select(select_cols).from(TableRef::new(partition_alias).with_alias(partition_alias)).join(
                    JoinType::Inner,
                    TableRef::new(&journeys_name).with_alias(&journeys_name),
                    table_col(&journeys_name, &group_identifier).eq(table_col(partition_alias, GROUP_LABEL)),
                )
            } else {
                let idx_expr = get_event_index_col(ctx, 0)?;
                Query::new()
                    .select(vec![SelectExpr::new(star()), SelectExpr::new(idx_expr).with_alias(&step_event_index_column(0))])
                    .from(TableRef::new(&journeys_name).with_alias(&journeys_name))
            }
        } else {
            let idx_expr = get_event_index_col(ctx, index)?;
            Query::new()
                .select(vec![SelectExpr::new(star()), SelectExpr::new(idx_expr).with_alias(&step_event_index_column(index))])
                .from(TableRef::new(&journeys_name).with_alias(&journeys_name))
        };
        let next_name = journeys_ctx.next_cte_name();
        all_ctes.push(Cte::new(&next_name, next_query));
        journeys_name = next_name;
    }

    // One alias of `events_layer` per step, joined in below.
    let events_relations: Vec<String> = steps
        .iter()
        .enumerate()
        .map(|(index, _)| ctx.next_alias_name(&format!("step_{index}")))
        .collect();

    // ClickHouse can't express the time-limit predicate inside a join's ON
    // clause against an aggregate-derived column, so it gets a dedicated
    // CTE nulling out indices that fall outside the window instead.
    if time_limit_seconds.is_some() && enforce_time_limit_in_dedicated_cte {
        let limit_seconds = time_limit_seconds.unwrap();
        let mut select_cols = vec![SelectExpr::new(table_col(&journeys_name, &group_identifier))];
        for label in &partition_labels {
            select_cols.push(SelectExpr::new(table_col(&journeys_name, label)).with_alias(label));
        }

        let mut from_query = Query::new().from(TableRef::new(&journeys_name).with_alias(&journeys_name));
        for (index, alias) in events_relations.iter().enumerate() {
            let step_index_column = step_event_index_column(index);
            from_query = from_query.join(
                JoinType::Left,
                TableRef::new(&events_alias).with_alias(alias),
                table_col(alias, GROUP_LABEL)
                    .eq(table_col(&journeys_name, &group_identifier))
                    .and(table_col(alias, EVENT_INDEX_LABEL).eq(table_col(&journeys_name, &step_index_column))),
            );
            if index == 0 {
                select_cols.push(SelectExpr::new(table_col(&journeys_name, &step_index_column)).with_alias(&step_index_column));
            } else {
                let within = timestamp_diff_within(
                    ctx.dialect,
                    table_col(&events_relations[0], TIMESTAMP_LABEL),
                    table_col(alias, TIMESTAMP_LABEL),
                    limit_seconds,
                );
                let guarded = Expr::Case {
                    operand: None,
                    when_clauses: vec![(within, table_col(&journeys_name, &step_index_column))],
                    else_clause: None,
                };
                select_cols.push(SelectExpr::new(guarded).with_alias(&step_index_column));
            }
        }
        from_query.select = select_cols;
        let name = journeys_ctx.next_cte_name();
        all_ctes.push(Cte::new(&name, from_query));
        journeys_name = name;
    }

    // --- unique groups, outer-joined to the journeys so unmatched groups --
    // --- still appear with NULL step indices -------------------------------
    let unique_groups_source = base.clone().aggregate(vec![group_expr.clone()], Vec::new());
    let mut entity_base_layer = source_compiler::compile(ctx, &unique_groups_source)?;
    entity_base_layer = entity_base_layer.chained(ctx);
    let mut combined_ctes = all_ctes;
    combined_ctes.extend(entity_base_layer.query.with.clone());
    let entity_base_alias = entity_base_layer.main_alias.clone();

    entity_base_layer.query = entity_base_layer.query.left_join(
        TableRef::new(&journeys_name).with_alias(&journeys_name),
        table_col(&entity_base_alias, &group_identifier).eq(table_col(&journeys_name, &group_identifier)),
    );

    let mut final_select = vec![SelectExpr::new(table_col(&entity_base_alias, &group_identifier)).with_alias(&group_identifier)];
    for (expr, label) in partition_start_events.iter().zip(partition_labels.iter()) {
        let id = expr.effective_identifier().unwrap_or_else(|| label.clone());
        final_select.push(SelectExpr::new(table_col(&journeys_name, label)).with_alias(&id));
    }
    for index in 0..steps.len() {
        let name = step_event_index_column(index);
        final_select.push(SelectExpr::new(table_col(&journeys_name, &name)).with_alias(&name));
    }
    entity_base_layer.query = entity_base_layer.query.select(final_select);
    entity_base_layer.query.with = combined_ctes;

    if !partition_start_events.is_empty() {
        entity_base_layer.query = entity_base_layer
            .query
            .filter(table_col(&journeys_name, &step_event_index_column(0)).is_not_null());
    }

    let mut final_layer = entity_base_layer.chained(ctx);
    let final_alias = final_layer.main_alias.clone();

    // The group key and any partition-start-event values are this layer's
    // own visible columns; everything step-specific resolves through the
    // per-step namespaces joined in below instead.
    let mut own_select = vec![SelectExpr::new(table_col(&final_alias, &group_identifier)).with_alias(&group_identifier)];
    let mut own_columns: ColumnTypeMap = ColumnTypeMap::new();
    own_columns.insert(group_identifier.clone(), final_layer.main_columns.get(&group_identifier).copied().unwrap_or_default());
    for (expr, label) in partition_start_events.iter().zip(partition_labels.iter()) {
        let id = expr.effective_identifier().unwrap_or_else(|| label.clone());
        own_select.push(SelectExpr::new(table_col(&final_alias, &id)).with_alias(&id));
        own_columns.insert(id, crate::model::DataType::Unknown);
    }
    final_layer.query = final_layer.query.select(own_select);
    final_layer.main_columns = own_columns;

    for (index, step) in steps.iter().enumerate() {
        let events_relation = &events_relations[index];
        let step_index_column = step_event_index_column(index);
        let mut on = table_col(events_relation, GROUP_LABEL)
            .eq(table_col(&final_alias, &group_identifier))
            .and(table_col(events_relation, EVENT_INDEX_LABEL).eq(table_col(&final_alias, &step_index_column)));
        if let Some(limit_seconds) = time_limit_seconds {
            if !enforce_time_limit_in_dedicated_cte && index > 0 {
                on = on.and(timestamp_diff_within(
                    ctx.dialect,
                    table_col(&events_relations[0], TIMESTAMP_LABEL),
                    table_col(events_relation, TIMESTAMP_LABEL),
                    limit_seconds,
                ));
            }
        }
        final_layer.add_join(JoinType::Left, TableRef::new(&events_alias).with_alias(events_relation), on);

        let step_identifier = step.effective_identifier().unwrap_or_else(|| format!("step_{index}"));
        final_layer.bind_namespace(
            &step_identifier,
            NamespaceBinding {
                alias: events_relation.clone(),
                columns: events_columns.clone(),
            },
        );
    }

    let _ = column_expression::preprocess; // keep module in scope for any future picks callers add atop this layer
    Ok(final_layer)
}

fn get_event_index_col(ctx: &QueryContext, index: usize) -> Result<Expr, CompileError> {
    let hash_char = step_hash_char(index)?;
    let target = if index == 0 {
        ctx.dialect.quote_identifier(JOURNEY_HASH_LABEL)
    } else {
        format!(
            "SUBSTRING({}, {} + 1)",
            ctx.dialect.quote_identifier(JOURNEY_HASH_LABEL),
            ctx.dialect.quote_identifier(&step_event_index_column(index - 1)),
        )
    };
    let pattern = format!("{hash_char}.*");
    let extracted = regex_extract(ctx, &target, &pattern);
    let expr = Expr::Raw(format!(
        "LENGTH({}) - LENGTH({}) + 1",
        ctx.dialect.quote_identifier(JOURNEY_HASH_LABEL),
        extracted
    ));
    Ok(if ctx.dialect == Dialect::ClickHouse {
        func("toUInt64", vec![expr])
    } else {
        expr
    })
}

fn regex_extract(ctx: &QueryContext, column_sql: &str, pattern: &str) -> String {
    match ctx.dialect {
        Dialect::BigQuery | Dialect::Snowflake => format!("REGEXP_SUBSTR({column_sql}, '{pattern}')"),
        Dialect::Postgres => format!("(regexp_match({column_sql}, '{pattern}'))[1]"),
        Dialect::Redshift => format!("(REGEXP_SUBSTR({column_sql}, '{pattern}'))"),
        Dialect::DuckDb => format!("(regexp_extract_all({column_sql}, '{pattern}'))[1]"),
        Dialect::Athena => format!("regexp_extract({column_sql}, '{pattern}')"),
        Dialect::ClickHouse => format!("regexpExtract({column_sql}, '{pattern}', 0)"),
        Dialect::Databricks => format!("try_element_at(regexp_extract_all({column_sql}, '{pattern}', 0),1)"),
        Dialect::MySql => format!("REGEXP_SUBSTR({column_sql}, '{pattern}')"),
        Dialect::TSql => {
            ctx.add_warning("regex extract is not codified for T-SQL and may be incorrect");
            format!("(regexp_match({column_sql}, '{pattern}'))[1]")
        }
    }
}

/// Per-dialect string aggregation of `__step_hash_id__`, ordered by
/// `__timestamp__` then `__step_hash_id__ DESC` so a tie between two
/// events is broken in favor of the earlier step (spec.md §4.6).
fn build_journey_hash(dialect: Dialect) -> Expr {
    match dialect {
        Dialect::Snowflake | Dialect::Athena => Expr::Raw(format!(
            "LISTAGG({STEP_HASH_ID_LABEL}, '') WITHIN GROUP (ORDER BY {TIMESTAMP_LABEL}, {STEP_HASH_ID_LABEL} DESC)"
        )),
        Dialect::Databricks => Expr::Raw(format!(
            "array_join(transform(array_sort(array_agg(struct({STEP_HASH_ID_LABEL}, {TIMESTAMP_LABEL}))), \
             (left, right) -> CASE WHEN left.{TIMESTAMP_LABEL} < right.{TIMESTAMP_LABEL} THEN -1 \
             WHEN left.{TIMESTAMP_LABEL} > right.{TIMESTAMP_LABEL} THEN 1 \
             ELSE CASE WHEN left.{STEP_HASH_ID_LABEL} < right.{STEP_HASH_ID_LABEL} THEN 1 ELSE -1 END END), \
             x -> x.{STEP_HASH_ID_LABEL}), '')"
        )),
        Dialect::Redshift => Expr::Raw(format!(
            "LISTAGG({STEP_HASH_ID_LABEL}) WITHIN GROUP (ORDER BY {TIMESTAMP_LABEL}, {STEP_HASH_ID_LABEL} DESC)"
        )),
        Dialect::ClickHouse => Expr::Raw(format!("arrayStringConcat(groupArray({STEP_HASH_ID_LABEL}))")),
        Dialect::MySql => Expr::Raw(format!(
            "GROUP_CONCAT({STEP_HASH_ID_LABEL} ORDER BY {TIMESTAMP_LABEL} ASC, {STEP_HASH_ID_LABEL} DESC SEPARATOR '')"
        )),
        _ => Expr::Raw(format!("STRING_AGG({STEP_HASH_ID_LABEL}, '' ORDER BY {TIMESTAMP_LABEL}, {STEP_HASH_ID_LABEL} DESC)")),
    }
}

/// `timestamp_diff(ts2, ts1) <= limit_seconds`, per-dialect (spec.md §4.6).
fn timestamp_diff_within(dialect: Dialect, ts1: Expr, ts2: Expr, limit_seconds: i64) -> Expr {
    match dialect {
        Dialect::Snowflake => func("TIMESTAMPDIFF", vec![Expr::Raw("second".to_string()), ts1, ts2]).lt(lit_int(limit_seconds)),
        Dialect::Redshift => func(
            "DATEDIFF",
            vec![
                Expr::Raw("second".to_string()),
                func("CAST", vec![ts1, Expr::Raw("TIMESTAMP".to_string())]),
                func("CAST", vec![ts2, Expr::Raw("TIMESTAMP".to_string())]),
            ],
        )
        .lt(lit_int(limit_seconds)),
        Dialect::ClickHouse => func("dateDiff", vec![lit_str("second"), ts1, ts2]).lt(lit_int(limit_seconds)),
        Dialect::MySql => func("TIMESTAMPDIFF", vec![Expr::Raw("SECOND".to_string()), ts1, ts2]).lt(lit_int(limit_seconds)),
        _ => {
            let interval = Literal::normalize_duration(limit_seconds);
            let interval_expr = match interval {
                Literal::TimeInterval { unit, num } => Expr::Raw(intervals::literal(dialect, unit, num)),
                _ => Expr::Raw(intervals::literal(dialect, IntervalUnit::Seconds, limit_seconds)),
            };
            ts2.sub(ts1).lt(interval_expr)
        }
    }
}
