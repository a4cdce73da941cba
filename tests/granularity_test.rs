//! Integration tests for the per-dialect date/timestamp truncation table
//! (spec.md §4.5.2), exercised across the full set of actively-supported
//! dialects rather than just the handful inline-tested alongside the
//! implementation.

use mantis::col;
use mantis::compile::column_expression::granularity::truncate;
use mantis::config::Weekday;
use mantis::dialect::Dialect;
use mantis::expr::ExprExt;
use mantis::model::Grain;

fn render(dialect: Dialect, grain: Grain, weekday: Weekday) -> String {
    truncate(dialect, col("ts"), grain, weekday).to_tokens_for_dialect(dialect).serialize(dialect)
}

#[test]
fn bigquery_truncates_every_non_week_grain_via_timestamp_trunc() {
    for grain in [Grain::Second, Grain::Minute, Grain::Hour, Grain::Day, Grain::Month, Grain::Quarter, Grain::Year] {
        let sql = render(Dialect::BigQuery, grain, Weekday::Monday);
        assert!(sql.starts_with("TIMESTAMP_TRUNC("), "grain {grain:?} got: {sql}");
    }
}

#[test]
fn most_dialects_truncate_non_week_grains_via_date_trunc() {
    for dialect in [
        Dialect::DuckDb,
        Dialect::Postgres,
        Dialect::Snowflake,
        Dialect::Redshift,
        Dialect::Databricks,
        Dialect::ClickHouse,
        Dialect::Athena,
    ] {
        for grain in [Grain::Second, Grain::Minute, Grain::Hour, Grain::Day, Grain::Month, Grain::Quarter, Grain::Year] {
            let sql = render(dialect, grain, Weekday::Monday);
            assert!(sql.starts_with("DATE_TRUNC("), "dialect {dialect:?} grain {grain:?} got: {sql}");
        }
    }
}

#[test]
fn mysql_synthesizes_each_non_week_grain_with_its_own_function() {
    let day = render(Dialect::MySql, Grain::Day, Weekday::Monday);
    assert!(day.starts_with("DATE("), "got: {day}");

    let month = render(Dialect::MySql, Grain::Month, Weekday::Monday);
    assert!(month.contains("DATE_FORMAT"), "got: {month}");
    assert!(month.contains("%Y-%m-01"), "got: {month}");

    let year = render(Dialect::MySql, Grain::Year, Weekday::Monday);
    assert!(year.contains("MAKEDATE"), "got: {year}");

    let hour = render(Dialect::MySql, Grain::Hour, Weekday::Monday);
    assert!(hour.contains("%H:00:00"), "got: {hour}");
}

#[test]
fn bigquery_week_truncation_names_the_offset_weekday() {
    let monday_first = render(Dialect::BigQuery, Grain::Week, Weekday::Monday);
    assert!(monday_first.contains("WEEK(MONDAY)"), "got: {monday_first}");

    let sunday_first = render(Dialect::BigQuery, Grain::Week, Weekday::Sunday);
    assert!(sunday_first.contains("WEEK(SUNDAY)"), "got: {sunday_first}");
}

#[test]
fn every_weekday_setting_produces_a_distinct_postgres_offset() {
    let mut seen = std::collections::BTreeSet::new();
    for weekday in [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ] {
        let sql = render(Dialect::Postgres, Grain::Week, weekday);
        assert!(sql.contains("DATE_TRUNC('week'"), "got: {sql}");
        assert!(sql.contains("INTERVAL '"), "got: {sql}");
        seen.insert(sql);
    }
    assert_eq!(seen.len(), 7, "each weekday setting should produce a distinct offset");
}

#[test]
fn clickhouse_uses_tomonday_plus_interval_day_for_non_sunday_offsets() {
    let sql = render(Dialect::ClickHouse, Grain::Week, Weekday::Wednesday);
    assert!(sql.contains("toMonday("), "got: {sql}");
    assert!(sql.contains("toIntervalDay("), "got: {sql}");
}

#[test]
fn mysql_week_truncation_wraps_the_shift_in_an_interval_day_clause() {
    let sql = render(Dialect::MySql, Grain::Week, Weekday::Monday);
    assert!(sql.starts_with("DATE_SUB("), "got: {sql}");
    assert!(sql.contains("INTERVAL"), "got: {sql}");
    assert!(sql.contains("DAY"), "got: {sql}");
}
