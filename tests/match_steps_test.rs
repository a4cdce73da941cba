//! Integration tests for the `MatchSteps` funnel compiler (spec.md §4.6,
//! §8 testable property 9 "journey-hash determinism").

use mantis::compile::compile_sql;
use mantis::dialect::Dialect;
use mantis::error::{CompileError, UserCompilationError};
use mantis::model::{ActivitySchema, ColumnExpression, ConnectionHandle, Model, Source};

fn events_schema() -> ActivitySchema {
    ActivitySchema {
        group: ColumnExpression::column("user_id"),
        timestamp: ColumnExpression::column("occurred_at"),
        event_key: ColumnExpression::column("event"),
    }
}

fn funnel_model(steps: Vec<ColumnExpression>, time_limit_seconds: Option<i64>) -> Model {
    Model::new(
        ConnectionHandle::new("duckdb"),
        Source::table("events").match_steps(events_schema(), steps, vec![], time_limit_seconds),
    )
}

#[test]
fn empty_steps_is_a_user_compilation_error() {
    let model = funnel_model(vec![], None);
    let err = compile_sql(&model, Dialect::DuckDb).unwrap_err();
    assert!(matches!(err, CompileError::User(UserCompilationError::EmptyMatchSteps)));
}

#[test]
fn more_than_sixty_two_steps_is_a_user_compilation_error() {
    let steps: Vec<ColumnExpression> = (0..63)
        .map(|i| ColumnExpression::column("event").eq(ColumnExpression::str_lit(format!("step_{i}"))))
        .collect();
    let model = funnel_model(steps, None);
    let err = compile_sql(&model, Dialect::DuckDb).unwrap_err();
    assert!(matches!(err, CompileError::User(UserCompilationError::TooManyMatchSteps)));
}

#[test]
fn sixty_two_steps_is_exactly_at_the_limit_and_compiles() {
    let steps: Vec<ColumnExpression> = (0..62)
        .map(|i| ColumnExpression::column("event").eq(ColumnExpression::str_lit(format!("step_{i}"))))
        .collect();
    let model = funnel_model(steps, None);
    let sql = compile_sql(&model, Dialect::DuckDb).unwrap();
    assert!(sql.contains("WITH"), "got: {sql}");
}

#[test]
fn a_basic_three_step_funnel_compiles_with_the_expected_plumbing() {
    let steps = vec![
        ColumnExpression::column("event").eq(ColumnExpression::str_lit("signup")),
        ColumnExpression::column("event").eq(ColumnExpression::str_lit("activate")),
        ColumnExpression::column("event").eq(ColumnExpression::str_lit("purchase")),
    ];
    let model = funnel_model(steps, Some(3600));
    let sql = compile_sql(&model, Dialect::DuckDb).unwrap();

    assert!(sql.contains("WITH"), "got: {sql}");
    assert!(sql.contains("ROW_NUMBER") || sql.contains("row_number"), "got: {sql}");
    assert!(sql.contains("STRING_AGG") || sql.to_uppercase().contains("STRING_AGG"), "got: {sql}");
    assert!(sql.contains("LEFT JOIN"), "got: {sql}");
}

#[test]
fn each_dialect_produces_a_distinct_journey_hash_aggregation_without_erroring() {
    let steps = vec![
        ColumnExpression::column("event").eq(ColumnExpression::str_lit("signup")),
        ColumnExpression::column("event").eq(ColumnExpression::str_lit("purchase")),
    ];

    for dialect in [
        Dialect::DuckDb,
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::Snowflake,
        Dialect::BigQuery,
        Dialect::Redshift,
        Dialect::Databricks,
        Dialect::ClickHouse,
        Dialect::Athena,
    ] {
        let model = funnel_model(steps.clone(), None);
        let sql = compile_sql(&model, dialect).expect("every targeted dialect should compile a funnel");
        assert!(sql.contains("WITH"), "dialect {dialect:?} got: {sql}");
    }
}

#[test]
fn partition_start_events_add_a_partitioning_cte_chain() {
    let model = Model::new(
        ConnectionHandle::new("duckdb"),
        Source::table("events").match_steps(
            events_schema(),
            vec![
                ColumnExpression::column("event").eq(ColumnExpression::str_lit("signup")),
                ColumnExpression::column("event").eq(ColumnExpression::str_lit("purchase")),
            ],
            vec![ColumnExpression::column("campaign")],
            None,
        ),
    );
    let sql = compile_sql(&model, Dialect::DuckDb).unwrap();
    assert!(sql.contains("campaign"), "got: {sql}");
}
