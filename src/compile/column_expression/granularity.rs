//! Per-dialect date/timestamp truncation table (spec.md §4.5.2).

use crate::config::Weekday;
use crate::model::{Grain, IntervalUnit};
use crate::sql::expr::{func, lit_int, lit_str, ExprExt};
use crate::sql::{Dialect, Expr};

use super::intervals;

/// Truncate `expr` to `grain`, honoring `first_day_of_week` for `Grain::Week`.
pub fn truncate(dialect: Dialect, expr: Expr, grain: Grain, first_day_of_week: Weekday) -> Expr {
    if grain == Grain::Week {
        return truncate_week(dialect, expr, first_day_of_week.offset_from_monday());
    }

    match dialect {
        Dialect::BigQuery => func("TIMESTAMP_TRUNC", vec![expr, Expr::Raw(grain.as_str().to_uppercase())]),
        Dialect::MySql => synthesize_mysql(expr, grain),
        Dialect::Databricks if grain == Grain::Week => unreachable!("week handled above"),
        _ => func("DATE_TRUNC", vec![lit_str(grain.as_str()), expr]),
    }
}

fn truncate_week(dialect: Dialect, expr: Expr, offset: u32) -> Expr {
    match dialect {
        Dialect::BigQuery => func(
            "DATE_TRUNC",
            vec![expr, Expr::Raw(format!("WEEK({})", weekday_name(offset)))],
        ),
        Dialect::MySql => {
            let shift = Expr::Raw(format!(
                "(DAYOFWEEK({}) - (({} + 1) % 7 + 1) + 7) % 7",
                render_placeholder(&expr),
                offset
            ));
            func("DATE_SUB", vec![expr, mysql_interval(shift, "DAY")])
        }
        Dialect::Databricks => {
            // Spark SQL's `date_sub` takes a plain day count, no INTERVAL wrapper.
            let shift = Expr::Raw(format!(
                "(DAYOFWEEK({}) - (({} + 1) % 7 + 1) + 7) % 7",
                render_placeholder(&expr),
                offset
            ));
            func("DATE_SUB", vec![expr, shift])
        }
        Dialect::ClickHouse => {
            if offset == 6 {
                func("toStartOfWeek", vec![expr])
            } else {
                func("toMonday", vec![expr]).add(func(
                    "toIntervalDay",
                    vec![lit_int(offset as i64)],
                ))
            }
        }
        _ => {
            let interval = Expr::Raw(intervals::literal(dialect, IntervalUnit::Days, offset as i64));
            let shifted = expr.clone().sub(interval.clone());
            func("DATE_TRUNC", vec![lit_str("week"), shifted]).add(interval)
        }
    }
}

/// MySQL has no native single-call truncator; each grain is synthesized.
fn synthesize_mysql(expr: Expr, grain: Grain) -> Expr {
    match grain {
        Grain::Second => func("DATE_FORMAT", vec![expr, lit_str("%Y-%m-%d %H:%i:%s")]),
        Grain::Minute => func("DATE_FORMAT", vec![expr, lit_str("%Y-%m-%d %H:%i:00")]),
        Grain::Hour => func("DATE_FORMAT", vec![expr, lit_str("%Y-%m-%d %H:00:00")]),
        Grain::Day => func("DATE", vec![expr]),
        Grain::Month => func("DATE_FORMAT", vec![expr, lit_str("%Y-%m-01")]),
        Grain::Quarter => func(
            "MAKEDATE",
            vec![func("YEAR", vec![expr.clone()]), lit_int(1)],
        )
        .add(mysql_interval(
            func("QUARTER", vec![expr]).sub(lit_int(1)).mul(lit_int(3)),
            "MONTH",
        )),
        Grain::Year => func("MAKEDATE", vec![func("YEAR", vec![expr]), lit_int(1)]),
        Grain::Week => unreachable!("week handled by truncate_week"),
    }
}

fn weekday_name(offset: u32) -> &'static str {
    match offset {
        0 => "MONDAY",
        1 => "TUESDAY",
        2 => "WEDNESDAY",
        3 => "THURSDAY",
        4 => "FRIDAY",
        5 => "SATURDAY",
        _ => "SUNDAY",
    }
}

/// MySQL's `INTERVAL expr unit` infix form accepts an arbitrary expression,
/// not just a literal count, so it can't go through `intervals::literal`.
fn mysql_interval(value: Expr, unit: &str) -> Expr {
    let rendered = value.to_tokens_for_dialect(Dialect::MySql).serialize(Dialect::MySql);
    Expr::Raw(format!("INTERVAL {rendered} {unit}"))
}

fn render_placeholder(expr: &Expr) -> String {
    // Best-effort textual hint used only inside a `Raw` fragment for
    // dialects synthesizing week arithmetic by hand; the real expression
    // is still substituted structurally by the caller's `func`/`sub` tree.
    match expr {
        Expr::Column { table: Some(t), column } => format!("{t}.{column}"),
        Expr::Column { table: None, column } => column.clone(),
        _ => "expr".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::col;

    #[test]
    fn non_week_grains_use_date_trunc_by_default() {
        let e = truncate(Dialect::Postgres, col("ts"), Grain::Month, Weekday::Monday);
        assert!(matches!(e, Expr::Function { ref name, .. } if name == "DATE_TRUNC"));
    }

    #[test]
    fn bigquery_uses_timestamp_trunc() {
        let e = truncate(Dialect::BigQuery, col("ts"), Grain::Day, Weekday::Monday);
        assert!(matches!(e, Expr::Function { ref name, .. } if name == "TIMESTAMP_TRUNC"));
    }

    #[test]
    fn clickhouse_monday_offset_uses_fast_path() {
        let e = truncate(Dialect::ClickHouse, col("ts"), Grain::Week, Weekday::Tuesday);
        assert!(matches!(e, Expr::Function { ref name, .. } if name == "toStartOfWeek"));
    }

    #[test]
    fn postgres_week_truncation_renders_a_proper_interval_literal_not_a_function_call() {
        let e = truncate(Dialect::Postgres, col("ts"), Grain::Week, Weekday::Monday);
        let sql = e.to_tokens_for_dialect(Dialect::Postgres).serialize(Dialect::Postgres);
        assert!(sql.contains("INTERVAL '0 days'"), "got: {sql}");
        assert!(!sql.contains("INTERVAL(0"), "got: {sql}");
    }

    #[test]
    fn postgres_sunday_first_week_shifts_by_six_days() {
        let e = truncate(Dialect::Postgres, col("ts"), Grain::Week, Weekday::Sunday);
        let sql = e.to_tokens_for_dialect(Dialect::Postgres).serialize(Dialect::Postgres);
        assert!(sql.contains("INTERVAL '6 days'"), "got: {sql}");
    }

    #[test]
    fn mysql_quarter_truncation_uses_infix_interval_syntax() {
        let e = truncate(Dialect::MySql, col("ts"), Grain::Quarter, Weekday::Monday);
        let sql = e.to_tokens_for_dialect(Dialect::MySql).serialize(Dialect::MySql);
        assert!(sql.contains("INTERVAL"), "got: {sql}");
        assert!(sql.contains("MONTH"), "got: {sql}");
        assert!(!sql.contains("INTERVAL("), "got: {sql}");
    }

    #[test]
    fn databricks_week_truncation_uses_date_sub_without_interval_wrapper() {
        let e = truncate(Dialect::Databricks, col("ts"), Grain::Week, Weekday::Monday);
        assert!(matches!(e, Expr::Function { ref name, .. } if name == "DATE_SUB"));
    }
}
