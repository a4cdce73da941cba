//! The two-phase column-expression compiler (spec.md §4.5): `preprocess`
//! folds constant datetime/interval arithmetic and rewrites `not(cmp)`
//! into the negated comparison; `compile` lowers the preprocessed tree to
//! a physical `sql::Expr`.

pub mod format_timestamp;
pub mod granularity;
pub mod intervals;

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::error::{CompileError, UserCompilationError};
use crate::model::{BinaryOpOptions, ColumnExpression, Grain, Literal, Operator};
use crate::sql::expr::{
    col, coalesce, count, count_star, func, lit_bool, lit_float, lit_int, lit_null, lit_str, star,
    table_col, table_star, ExprExt,
};
use crate::sql::{Dialect, Expr};

use super::context::QueryContext;
use super::query_layer::QueryLayer;

const SELF_TABLE_ALIAS: &str = "self";

// ---------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------

/// Recursively fold constant datetime/interval arithmetic and negated
/// comparisons (spec.md §4.5 "Preprocessing"). Idempotent: a node whose
/// `stable_key()` is already in `ctx`'s preprocessed set is returned as-is.
pub fn preprocess(ctx: &QueryContext, expr: &ColumnExpression) -> ColumnExpression {
    let key = expr.stable_key();
    if ctx.is_preprocessed(&key) {
        return expr.clone();
    }

    let folded = match expr {
        ColumnExpression::BinaryOp {
            left,
            op,
            right,
            options,
            manually_set_identifier,
        } => {
            let left = preprocess(ctx, left);
            let right = preprocess(ctx, right);
            match (op, &left, &right) {
                (Operator::Add, ColumnExpression::PyValue { value: dt, .. }, ColumnExpression::PyValue { value: iv, .. })
                    if dt.as_interval_seconds().is_none() && iv.as_interval_seconds().is_some() =>
                {
                    fold_datetime_arith(dt, iv.as_interval_seconds().unwrap(), 1)
                        .unwrap_or_else(|| rebuild_binary(left, *op, right, options.clone(), manually_set_identifier.clone()))
                }
                (Operator::Sub, ColumnExpression::PyValue { value: dt, .. }, ColumnExpression::PyValue { value: iv, .. })
                    if dt.as_interval_seconds().is_none() && iv.as_interval_seconds().is_some() =>
                {
                    fold_datetime_arith(dt, iv.as_interval_seconds().unwrap(), -1)
                        .unwrap_or_else(|| rebuild_binary(left, *op, right, options.clone(), manually_set_identifier.clone()))
                }
                _ => rebuild_binary(left, *op, right, options.clone(), manually_set_identifier.clone()),
            }
        }
        ColumnExpression::Granularity {
            base,
            grain,
            manually_set_identifier,
        } => {
            let base = preprocess(ctx, base);
            if let ColumnExpression::PyValue { value: Literal::DateTime(iso), .. } = &base {
                if let Some(truncated) = truncate_iso_constant(iso, *grain, ctx.settings.first_day_of_week) {
                    ColumnExpression::PyValue {
                        value: Literal::DateTime(truncated),
                        manually_set_identifier: manually_set_identifier.clone(),
                    }
                } else {
                    base.by_grain(*grain).named_opt(manually_set_identifier.clone())
                }
            } else {
                base.by_grain(*grain).named_opt(manually_set_identifier.clone())
            }
        }
        ColumnExpression::SqlFunction {
            name,
            args,
            inherit_identifier: _,
            manually_set_identifier,
        } if name.eq_ignore_ascii_case("not") && args.len() == 1 => {
            let inner = preprocess(ctx, &args[0]);
            match negate_comparison(&inner) {
                Some(negated) => negated.named_opt(manually_set_identifier.clone()),
                None => ColumnExpression::SqlFunction {
                    name: name.clone(),
                    args: vec![inner],
                    inherit_identifier: false,
                    manually_set_identifier: manually_set_identifier.clone(),
                },
            }
        }
        ColumnExpression::Cases {
            cases,
            other,
            manually_set_identifier,
        } => ColumnExpression::Cases {
            cases: cases
                .iter()
                .map(|(c, v)| (preprocess(ctx, c), preprocess(ctx, v)))
                .collect(),
            other: other.as_ref().map(|o| Box::new(preprocess(ctx, o))),
            manually_set_identifier: manually_set_identifier.clone(),
        },
        ColumnExpression::FormatTimestamp {
            base,
            format,
            manually_set_identifier,
        } => ColumnExpression::FormatTimestamp {
            base: Box::new(preprocess(ctx, base)),
            format: format.clone(),
            manually_set_identifier: manually_set_identifier.clone(),
        },
        ColumnExpression::SqlFunction {
            name,
            args,
            inherit_identifier,
            manually_set_identifier,
        } => ColumnExpression::SqlFunction {
            name: name.clone(),
            args: args.iter().map(|a| preprocess(ctx, a)).collect(),
            inherit_identifier: *inherit_identifier,
            manually_set_identifier: manually_set_identifier.clone(),
        },
        other => other.clone(),
    };

    ctx.mark_preprocessed(&key);
    folded
}

fn rebuild_binary(
    left: ColumnExpression,
    op: Operator,
    right: ColumnExpression,
    options: BinaryOpOptions,
    manually_set_identifier: Option<String>,
) -> ColumnExpression {
    ColumnExpression::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
        options,
        manually_set_identifier,
    }
}

trait NamedOpt: Sized {
    fn named_opt(self, id: Option<String>) -> Self;
}

impl NamedOpt for ColumnExpression {
    fn named_opt(self, id: Option<String>) -> Self {
        match id {
            Some(id) => self.named(id),
            None => self,
        }
    }
}

/// `dt + sign * interval_seconds`, computed at compile time. Only whole-day
/// (and coarser) ISO-date arithmetic is folded here; anything finer is left
/// for the warehouse to evaluate at runtime.
fn fold_datetime_arith(dt: &Literal, interval_seconds: i64, sign: i64) -> Option<ColumnExpression> {
    let iso = match dt {
        Literal::DateTime(iso) | Literal::Date(iso) => iso,
        _ => return None,
    };
    let days = sign * interval_seconds / 86_400;
    let shifted = shift_iso_date(iso, days)?;
    Some(ColumnExpression::literal(Literal::DateTime(shifted)))
}

fn shift_iso_date(iso: &str, days: i64) -> Option<String> {
    let date_part = iso.get(0..10)?;
    let mut parts = date_part.split('-');
    let y: i64 = parts.next()?.parse().ok()?;
    let m: i64 = parts.next()?.parse().ok()?;
    let d: i64 = parts.next()?.parse().ok()?;
    let epoch_day = days_from_civil(y, m, d) + days;
    let (ny, nm, nd) = civil_from_days(epoch_day);
    let rest = iso.get(10..).unwrap_or("");
    Some(format!("{ny:04}-{nm:02}-{nd:02}{rest}"))
}

// Howard Hinnant's civil-calendar algorithm; avoids pulling in a date crate
// the teacher's own dependency stack doesn't carry.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn truncate_iso_constant(iso: &str, grain: Grain, first_day_of_week: crate::config::Weekday) -> Option<String> {
    let date_part = iso.get(0..10)?;
    match grain {
        Grain::Day => Some(format!("{date_part}T00:00:00")),
        Grain::Month => Some(format!("{}-01T00:00:00", date_part.get(0..7)?)),
        Grain::Year => Some(format!("{}-01-01T00:00:00", date_part.get(0..4)?)),
        Grain::Week => {
            let mut parts = date_part.split('-');
            let y: i64 = parts.next()?.parse().ok()?;
            let m: i64 = parts.next()?.parse().ok()?;
            let d: i64 = parts.next()?.parse().ok()?;
            let epoch_day = days_from_civil(y, m, d);
            let weekday_from_monday = ((epoch_day % 7) + 7 + 3) % 7; // 1970-01-01 was a Thursday
            let offset = first_day_of_week.offset_from_monday() as i64;
            let back = (weekday_from_monday - offset + 7) % 7;
            let (ny, nm, nd) = civil_from_days(epoch_day - back);
            Some(format!("{ny:04}-{nm:02}-{nd:02}T00:00:00"))
        }
        _ => None,
    }
}

fn negate_comparison(expr: &ColumnExpression) -> Option<ColumnExpression> {
    if let ColumnExpression::BinaryOp {
        left,
        op,
        right,
        options,
        ..
    } = expr
    {
        let negated = op.negated()?;
        return Some(ColumnExpression::BinaryOp {
            left: left.clone(),
            op: negated,
            right: right.clone(),
            options: options.clone(),
            manually_set_identifier: None,
        });
    }
    None
}

// ---------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------

/// Compile a preprocessed expression against `layer`'s current namespace
/// set. When `labeled` is true and the expression carries an identifier
/// (and isn't the bare `*`), the result is wrapped `AS identifier`.
pub fn compile(
    ctx: &QueryContext,
    layer: &QueryLayer,
    expr: &ColumnExpression,
    labeled: bool,
) -> Result<Expr, CompileError> {
    let compiled = compile_inner(ctx, layer, expr)?;
    if labeled && !expr.is_star() {
        if let Some(id) = expr.effective_identifier() {
            return Ok(Expr::Raw(format!(
                "{} AS {}",
                render(ctx.dialect, &compiled),
                ctx.dialect.quote_identifier(&id)
            )));
        }
    }
    Ok(compiled)
}

fn render(dialect: Dialect, expr: &Expr) -> String {
    expr.to_tokens_for_dialect(dialect).serialize(dialect)
}

fn compile_inner(ctx: &QueryContext, layer: &QueryLayer, expr: &ColumnExpression) -> Result<Expr, CompileError> {
    match expr {
        ColumnExpression::ColumnName {
            name,
            namespace_identifier,
            ..
        } => Ok(compile_column_name(ctx, layer, name, namespace_identifier.as_deref())),

        ColumnExpression::SqlText {
            sql,
            namespace_identifier,
            nested_expressions,
            ..
        } => compile_sql_text(ctx, layer, sql, namespace_identifier.as_deref(), nested_expressions),

        ColumnExpression::PyValue { value, .. } => Ok(compile_literal(ctx.dialect, value)),

        ColumnExpression::BinaryOp {
            left, op, right, options, ..
        } => compile_binary_op(ctx, layer, left, *op, right, options),

        ColumnExpression::Cases { cases, other, .. } => {
            let mut when_clauses = Vec::with_capacity(cases.len());
            for (cond, val) in cases {
                when_clauses.push((compile_inner(ctx, layer, cond)?, compile_inner(ctx, layer, val)?));
            }
            let else_clause = other
                .as_ref()
                .map(|o| compile_inner(ctx, layer, o))
                .transpose()?
                .map(Box::new);
            if when_clauses.is_empty() {
                return Err(UserCompilationError::EmptyCases.into());
            }
            Ok(Expr::Case {
                operand: None,
                when_clauses,
                else_clause,
            })
        }

        ColumnExpression::Granularity { base, grain, .. } => {
            let base_expr = compile_inner(ctx, layer, base)?;
            Ok(granularity::truncate(ctx.dialect, base_expr, *grain, ctx.settings.first_day_of_week))
        }

        ColumnExpression::FormatTimestamp { base, format, .. } => {
            let base_expr = compile_inner(ctx, layer, base)?;
            Ok(format_timestamp::compile(ctx.dialect, base_expr, format)?)
        }

        ColumnExpression::SqlFunction {
            name, args, inherit_identifier: _, ..
        } => compile_sql_function(ctx, layer, name, args),

        ColumnExpression::Subquery { model, .. } => {
            let sub_ctx = ctx.fork_cte_names("sub");
            let sub_query = super::source_compiler::compile_source(&sub_ctx, &model.source)?;
            Ok(Expr::Subquery(Box::new(sub_query.query)))
        }
    }
}

fn compile_column_name(ctx: &QueryContext, layer: &QueryLayer, name: &str, namespace: Option<&str>) -> Expr {
    let needs_disambiguation = !layer.namespaces.is_empty() && !layer.is_aggregated;
    if needs_disambiguation || namespace.is_some() {
        let base = layer.column_ref(namespace, name);
        return snowflake_timestamp_workaround(ctx.dialect, base, layer, namespace, name);
    }
    let base = col(name);
    snowflake_timestamp_workaround(ctx.dialect, base, layer, namespace, name)
}

fn snowflake_timestamp_workaround(dialect: Dialect, expr: Expr, layer: &QueryLayer, namespace: Option<&str>, name: &str) -> Expr {
    use crate::model::DataType;
    if dialect == Dialect::Snowflake {
        let ty = layer.column_type(namespace, name);
        if ty == DataType::TimestampTz {
            return func("CAST", vec![expr, Expr::Raw("TIMESTAMP_NTZ".into())]);
        }
    }
    expr
}

fn compile_sql_text(
    ctx: &QueryContext,
    layer: &QueryLayer,
    sql: &str,
    namespace: Option<&str>,
    nested: &std::collections::BTreeMap<String, ColumnExpression>,
) -> Result<Expr, CompileError> {
    if sql.trim() == "*" {
        return Ok(match namespace {
            Some(ns) => {
                let alias = layer
                    .namespaces
                    .get(ns)
                    .map(|b| b.alias.clone())
                    .unwrap_or_else(|| ns.to_string());
                table_star(&alias)
            }
            None if !layer.namespaces.is_empty() => table_star(&layer.main_alias),
            None => star(),
        });
    }

    let inlined = inline_references(ctx, layer, sql, nested, 0)?;
    let qualified = qualify_table_references(ctx, layer, &inlined);
    Ok(Expr::Raw(qualified))
}

/// Replace `{{ id }}` / `{{ namespace.attr }}` substrings with the compiled
/// SQL text of the referenced expression. Bounded at 10,000 expansions
/// (spec.md §4.5 "Reference inlining").
fn inline_references(
    ctx: &QueryContext,
    layer: &QueryLayer,
    sql: &str,
    nested: &std::collections::BTreeMap<String, ColumnExpression>,
    depth: usize,
) -> Result<String, CompileError> {
    if depth > 10_000 {
        return Err(UserCompilationError::ReferenceExpansionLimit(sql.to_string()).into());
    }
    let mut out = String::new();
    let mut rest = sql;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            CompileError::from(UserCompilationError::UnparseableSql(sql.to_string()))
        })?;
        let key = after[..end].trim();
        let resolved = nested.get(key).ok_or_else(|| {
            CompileError::from(UserCompilationError::UnknownReference(key.to_string()))
        })?;
        let compiled = compile_inner(ctx, layer, resolved)?;
        out.push_str(&render(ctx.dialect, &compiled));
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    if out.contains("{{") {
        inline_references(ctx, layer, &out, nested, depth + 1)
    } else {
        Ok(out)
    }
}

/// Rewrite `self.col` / `<namespace>.col` qualifiers to the layer's actual
/// runtime alias, dropping the qualifier entirely when column
/// disambiguation isn't needed.
///
/// This is the "limited AST rewrite" spec.md §1/§4.5 carves out of the
/// "no SQL parsing" non-goal: the raw SQL fragment is tokenized with
/// `sqlparser` (the same crate the teacher reaches for to work with
/// user-supplied SQL text) rather than scanned as a byte string, so a
/// `table.column` look-alike inside a string literal (`'self.col'`) or a
/// genuinely quoted identifier (`"self".col`) is left untouched - only an
/// actual unquoted `Word . Word` token triple is a candidate. Token
/// `Display` round-trips whitespace/comment tokens verbatim, so fragments
/// that don't reference `self`/a namespace pass through unchanged.
fn qualify_table_references(ctx: &QueryContext, layer: &QueryLayer, sql: &str) -> String {
    let needs_disambiguation = !layer.namespaces.is_empty() && !layer.is_aggregated;

    let dialect = GenericDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(_) => return sql.to_string(),
    };

    let mut out = String::new();
    let mut i = 0usize;
    while i < tokens.len() {
        if let Token::Word(word) = &tokens[i] {
            if word.quote_style.is_none() {
                if let (Some(Token::Period), Some(Token::Word(_))) = (tokens.get(i + 1), tokens.get(i + 2)) {
                    let alias = if word.value == SELF_TABLE_ALIAS {
                        Some(layer.main_alias.clone())
                    } else {
                        layer.namespaces.get(word.value.as_str()).map(|b| b.alias.clone())
                    };
                    if let Some(alias) = alias {
                        if needs_disambiguation {
                            out.push_str(&ctx.dialect.quote_identifier(&alias));
                            out.push('.');
                        }
                        out.push_str(&tokens[i + 2].to_string());
                        i += 3;
                        continue;
                    }
                }
            }
        }

        out.push_str(&tokens[i].to_string());
        i += 1;
    }
    out
}

fn compile_literal(dialect: Dialect, value: &Literal) -> Expr {
    match value {
        Literal::Null => lit_null(),
        Literal::Bool(b) => lit_bool(*b),
        Literal::Int(i) => lit_int(*i),
        Literal::Float(f) => lit_float(*f),
        Literal::Str(s) => lit_str(s),
        Literal::List(items) => Expr::Raw(format!(
            "({})",
            items
                .iter()
                .map(|v| render(dialect, &compile_literal(dialect, v)))
                .collect::<Vec<_>>()
                .join(", ")
        )),
        Literal::Date(d) => Expr::Raw(dialect.format_date_literal(d)),
        Literal::DateTime(d) => Expr::Raw(format!("TIMESTAMP '{d}'")),
        Literal::TimeDelta(seconds) => {
            if let Literal::TimeInterval { unit, num } = Literal::normalize_duration(*seconds) {
                Expr::Raw(intervals::literal(dialect, unit, num))
            } else {
                unreachable!("normalize_duration always returns TimeInterval")
            }
        }
        Literal::TimeInterval { unit, num } => Expr::Raw(intervals::literal(dialect, *unit, *num)),
    }
}

fn compile_binary_op(
    ctx: &QueryContext,
    layer: &QueryLayer,
    left: &ColumnExpression,
    op: Operator,
    right: &ColumnExpression,
    options: &BinaryOpOptions,
) -> Result<Expr, CompileError> {
    let left_is_null = matches!(left, ColumnExpression::PyValue { value: Literal::Null, .. });
    let right_is_null = matches!(right, ColumnExpression::PyValue { value: Literal::Null, .. });

    if matches!(op, Operator::Eq | Operator::Ne) && (left_is_null || right_is_null) {
        if left_is_null && right_is_null {
            ctx.add_warning("comparing NULL to NULL folds to a constant boolean");
            return Ok(lit_bool(op == Operator::Eq));
        }
        let non_null = if left_is_null { right } else { left };
        let compiled = compile_inner(ctx, layer, non_null)?;
        return Ok(if op == Operator::Eq {
            compiled.is_null()
        } else {
            compiled.is_not_null()
        });
    }

    let left_expr = compile_inner(ctx, layer, left)?;
    let right_expr = compile_inner(ctx, layer, right)?;

    match op {
        Operator::Div => Ok(compile_division(ctx.dialect, left_expr, right_expr)),
        Operator::In => compile_in(ctx, layer, left_expr, right, right_expr),
        Operator::Like if options.case_insensitive => Ok(func("UPPER", vec![left_expr]).like(func("UPPER", vec![right_expr]))),
        Operator::Eq => Ok(left_expr.eq(right_expr)),
        Operator::Ne => Ok(left_expr.ne(right_expr)),
        Operator::Lt => Ok(left_expr.lt(right_expr)),
        Operator::Lte => Ok(left_expr.lte(right_expr)),
        Operator::Gt => Ok(left_expr.gt(right_expr)),
        Operator::Gte => Ok(left_expr.gte(right_expr)),
        Operator::Add => Ok(left_expr.add(right_expr)),
        Operator::Sub => Ok(left_expr.sub(right_expr)),
        Operator::Mul => Ok(left_expr.mul(right_expr)),
        Operator::Like => Ok(left_expr.like(right_expr)),
        Operator::ILike => Ok(func("UPPER", vec![left_expr]).like(func("UPPER", vec![right_expr]))),
    }
}

fn compile_division(dialect: Dialect, left: Expr, right: Expr) -> Expr {
    match dialect {
        Dialect::Postgres | Dialect::Redshift => func("CAST", vec![left, Expr::Raw("DECIMAL".into())]).div(right),
        Dialect::Athena => func("CAST", vec![left, Expr::Raw("DOUBLE".into())]).div(right),
        Dialect::ClickHouse => func("divide", vec![left, right]),
        _ => left.div(right),
    }
}

fn compile_in(
    ctx: &QueryContext,
    layer: &QueryLayer,
    left_expr: Expr,
    right_node: &ColumnExpression,
    right_expr: Expr,
) -> Result<Expr, CompileError> {
    match right_node {
        ColumnExpression::PyValue { value: Literal::List(items), .. } => {
            let has_null = items.iter().any(|v| matches!(v, Literal::Null));
            let non_null_values: Vec<Expr> = items
                .iter()
                .filter(|v| !matches!(v, Literal::Null))
                .map(|v| compile_literal(ctx.dialect, v))
                .collect();
            // Scenario C / testable property 8 (spec.md §8): a NULL member
            // of the RHS list is never matched by native `IN`, so split it
            // into its own `IS NULL` disjunct (mirrors
            // `column_expression.py`'s `_compile_in` null handling).
            if non_null_values.is_empty() {
                return Ok(left_expr.is_null());
            }
            let in_expr = left_expr.clone().in_list(non_null_values);
            Ok(if has_null { in_expr.or(left_expr.is_null()) } else { in_expr })
        }
        ColumnExpression::PyValue { value: Literal::Str(_), .. } => Ok(left_expr.like(right_expr)),
        ColumnExpression::Subquery { .. } => Ok(Expr::InSubquery {
            expr: Box::new(left_expr),
            subquery: match right_expr {
                Expr::Subquery(q) => q,
                other => Box::new(crate::sql::query::Query::new().select(vec![other])),
            },
            negated: false,
        }),
        _ => Ok(left_expr.in_list(vec![right_expr])),
    }
    .map(|e| {
        let _ = layer;
        e
    })
}

fn compile_sql_function(ctx: &QueryContext, layer: &QueryLayer, name: &str, args: &[ColumnExpression]) -> Result<Expr, CompileError> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "count" if args.is_empty() => Ok(count_star()),
        "and" => combine_bool(ctx, layer, args, true),
        "or" => combine_bool(ctx, layer, args, false),
        "not" => {
            let inner = compile_arg(ctx, layer, args, 0)?;
            Ok(inner.not())
        }
        "exists" => {
            let inner = compile_arg(ctx, layer, args, 0)?;
            Ok(match inner {
                Expr::Subquery(q) => Expr::Raw(format!("EXISTS ({})", q.to_sql(ctx.dialect))),
                other => Expr::Raw(format!("EXISTS ({})", render(ctx.dialect, &other))),
            })
        }
        "now" => Ok(Expr::Raw("CURRENT_TIMESTAMP".to_string())),
        "diffseconds" => {
            let a = compile_arg(ctx, layer, args, 0)?;
            let b = compile_arg(ctx, layer, args, 1)?;
            Ok(diff_seconds(ctx.dialect, a, b))
        }
        "cast" => {
            let inner = compile_arg(ctx, layer, args, 0)?;
            let type_name = match args.get(1) {
                Some(ColumnExpression::PyValue { value: Literal::Str(s), .. }) => s.clone(),
                _ => return Err(UserCompilationError::Other("cast() requires a string type name".into()).into()),
            };
            Ok(func("CAST", vec![inner, Expr::Raw(type_name)]))
        }
        "coalesce" => {
            let compiled: Vec<Expr> = args.iter().map(|a| compile_inner(ctx, layer, a)).collect::<Result<_, _>>()?;
            Ok(coalesce(compiled))
        }
        "count_if" => {
            let inner = compile_arg(ctx, layer, args, 0)?;
            Ok(count(Expr::Case {
                operand: None,
                when_clauses: vec![(inner, lit_int(1))],
                else_clause: None,
            }))
        }
        _ => {
            let compiled: Vec<Expr> = args.iter().map(|a| compile_inner(ctx, layer, a)).collect::<Result<_, _>>()?;
            let remapped = ctx.dialect.remap_function(name).map(str::to_string).unwrap_or_else(|| name.to_uppercase());
            Ok(func(&remapped, compiled))
        }
    }
}

fn compile_arg(ctx: &QueryContext, layer: &QueryLayer, args: &[ColumnExpression], idx: usize) -> Result<Expr, CompileError> {
    args.get(idx)
        .ok_or_else(|| UserCompilationError::Other(format!("missing argument at position {idx}")).into())
        .and_then(|a| compile_inner(ctx, layer, a))
}

fn combine_bool(ctx: &QueryContext, layer: &QueryLayer, args: &[ColumnExpression], is_and: bool) -> Result<Expr, CompileError> {
    let mut compiled = args.iter().map(|a| compile_inner(ctx, layer, a));
    let first = compiled.next().transpose()?.ok_or_else(|| {
        CompileError::from(UserCompilationError::Other("and()/or() requires at least one argument".into()))
    })?;
    compiled.try_fold(first, |acc, next| {
        let next = next?;
        Ok(if is_and { acc.and(next) } else { acc.or(next) })
    })
}

fn diff_seconds(dialect: Dialect, a: Expr, b: Expr) -> Expr {
    match dialect {
        Dialect::BigQuery => func("TIMESTAMP_DIFF", vec![a, b, Expr::Raw("SECOND".into())]),
        Dialect::Snowflake | Dialect::Redshift | Dialect::Postgres => {
            func("DATEDIFF", vec![Expr::Raw("second".into()), b, a])
        }
        Dialect::ClickHouse => func("dateDiff", vec![lit_str("second"), b, a]),
        _ => func("TIMESTAMPDIFF", vec![Expr::Raw("SECOND".into()), b, a]),
    }
}
