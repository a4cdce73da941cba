//! Per-dialect interval literal syntax (spec.md §4.5.1).

use crate::model::IntervalUnit;
use crate::sql::Dialect;

fn unit_word(unit: IntervalUnit, num: i64) -> &'static str {
    let plural = num != 1;
    match (unit, plural) {
        (IntervalUnit::Seconds, false) => "second",
        (IntervalUnit::Seconds, true) => "seconds",
        (IntervalUnit::Minutes, false) => "minute",
        (IntervalUnit::Minutes, true) => "minutes",
        (IntervalUnit::Hours, false) => "hour",
        (IntervalUnit::Hours, true) => "hours",
        (IntervalUnit::Days, false) => "day",
        (IntervalUnit::Days, true) => "days",
        (IntervalUnit::Weeks, false) => "week",
        (IntervalUnit::Weeks, true) => "weeks",
        (IntervalUnit::Months, false) => "month",
        (IntervalUnit::Months, true) => "months",
        (IntervalUnit::Years, false) => "year",
        (IntervalUnit::Years, true) => "years",
    }
}

/// Render `INTERVAL N UNIT` in whichever of the three shapes the target
/// dialect expects.
pub fn literal(dialect: Dialect, unit: IntervalUnit, num: i64) -> String {
    let word = unit_word(unit, num);
    match dialect {
        Dialect::BigQuery | Dialect::ClickHouse | Dialect::MySql => {
            format!("INTERVAL {} {}", num, word.to_uppercase())
        }
        Dialect::Athena => format!("INTERVAL '{}' {}", num, word.to_uppercase()),
        Dialect::DuckDb
        | Dialect::Databricks
        | Dialect::Postgres
        | Dialect::Redshift
        | Dialect::Snowflake
        | Dialect::TSql => format!("INTERVAL '{} {}'", num, word),
    }
}
