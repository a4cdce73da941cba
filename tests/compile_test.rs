//! Integration tests for the compiler's public entry points, covering
//! spec.md §8's concrete scenarios and testable properties.

use mantis::compile::{compile_sql, source_compiler, QueryContext};
use mantis::config::Settings;
use mantis::dialect::Dialect;
use mantis::model::{ColumnExpression, ConnectionHandle, Model, SortDir, Source};

fn duckdb_model(source: Source) -> Model {
    Model::new(ConnectionHandle::new("duckdb"), source)
}

// Scenario A: count(*) of a table.
#[test]
fn scenario_a_count_star_of_a_table() {
    let model = duckdb_model(Source::table("sales")).with_aggregate(vec![], vec![ColumnExpression::func("count", vec![]).named("count")]).unwrap();

    let sql = compile_sql(&model, Dialect::DuckDb).unwrap();
    assert!(sql.contains("COUNT("), "got: {sql}");
    assert!(sql.contains("AS \"count\""), "got: {sql}");
    assert!(sql.contains("sales"), "got: {sql}");
}

// Scenario B: group by year with a count measure.
#[test]
fn scenario_b_group_by_year_has_two_select_columns_and_group_by() {
    let model = duckdb_model(Source::table("sales"))
        .with_aggregate(
            vec![ColumnExpression::column("timestamp").by_year().named("timestamp")],
            vec![ColumnExpression::func("count", vec![]).named("count")],
        )
        .unwrap();

    let sql = compile_sql(&model, Dialect::DuckDb).unwrap();
    assert!(sql.contains("DATE_TRUNC"), "got: {sql}");
    assert!(sql.contains("GROUP BY"), "got: {sql}");
    assert!(sql.contains("COUNT("), "got: {sql}");
}

// ClickHouse groups by rendered column name rather than positional index:
// "region" shows up once in the SELECT list and again in GROUP BY, whereas
// every other dialect groups positionally and only selects it once.
#[test]
fn clickhouse_aggregate_groups_by_column_name_not_position() {
    let build = || {
        duckdb_model(Source::table("sales"))
            .with_aggregate(
                vec![ColumnExpression::column("region").named("region")],
                vec![ColumnExpression::func("count", vec![]).named("count")],
            )
            .unwrap()
    };

    let clickhouse_sql = compile_sql(&build(), Dialect::ClickHouse).unwrap();
    let postgres_sql = compile_sql(&build(), Dialect::Postgres).unwrap();

    assert!(clickhouse_sql.contains("GROUP BY"), "got: {clickhouse_sql}");
    assert!(postgres_sql.contains("GROUP BY"), "got: {postgres_sql}");
    assert!(
        clickhouse_sql.matches("region").count() > postgres_sql.matches("region").count(),
        "clickhouse should reference `region` again in GROUP BY: {clickhouse_sql} vs {postgres_sql}"
    );
}

// Scenario C: filter with a null-safe IN list.
#[test]
fn scenario_c_filter_with_null_containing_in_list_compiles_to_where() {
    use mantis::model::Literal;

    let model = duckdb_model(Source::table("sales")).with_filter(
        ColumnExpression::column("status").in_list(vec![Literal::Str("paid".into()), Literal::Null]),
    );

    let sql = compile_sql(&model, Dialect::DuckDb).unwrap();
    assert!(sql.contains("WHERE"), "got: {sql}");
    assert!(sql.to_uppercase().contains("IN"), "got: {sql}");
    // Scenario C's stated contract: `(status IN ('paid')) OR (status IS NULL)`,
    // not a bare `status IN ('paid', NULL)` (which never matches NULL rows).
    assert!(sql.contains("IN ('paid')"), "got: {sql}");
    assert!(sql.contains("IS NULL"), "got: {sql}");
    assert!(sql.contains(" OR "), "got: {sql}");
    assert!(!sql.to_uppercase().contains("'PAID', NULL"), "got: {sql}");
}

// Scenario E: week truncation respects `first_day_of_week`, Monday vs Sunday.
#[test]
fn scenario_e_week_truncation_respects_first_day_of_week_setting() {
    let model = duckdb_model(Source::table("sales")).with_pick(vec![ColumnExpression::column("ts").by_week().named("week")]);

    let monday_ctx = QueryContext::new(Dialect::Postgres, Settings { first_day_of_week: mantis::config::Weekday::Monday, ..Settings::default() }, None);
    let mut monday_layer = source_compiler::compile(&monday_ctx, &model.source).unwrap();
    monday_layer.finalized();
    let monday_sql = monday_layer.query.to_sql(Dialect::Postgres);
    assert!(monday_sql.contains("INTERVAL '0 days'"), "got: {monday_sql}");

    let sunday_ctx = QueryContext::new(Dialect::Postgres, Settings::default(), None);
    let mut sunday_layer = source_compiler::compile(&sunday_ctx, &model.source).unwrap();
    sunday_layer.finalized();
    let sunday_sql = sunday_layer.query.to_sql(Dialect::Postgres);
    assert!(sunday_sql.contains("INTERVAL '6 days'"), "got: {sunday_sql}");
}

// Scenario F: a model joined to itself collapses to a single CTE, reusing
// the same underlying table scan under two aliases.
#[test]
fn scenario_f_self_join_produces_exactly_one_cte() {
    let base = duckdb_model(Source::table("employees"));
    let plan = base.clone().with_join_one(
        "manager",
        base,
        ColumnExpression::column("manager_id").eq(ColumnExpression::column("id")),
        false,
    );

    let ctx = QueryContext::new(Dialect::Postgres, Settings::default(), None);
    let mut layer = source_compiler::compile(&ctx, &plan.source).unwrap();
    layer.finalized();

    assert_eq!(layer.query.with.len(), 1, "expected exactly one CTE, got: {:?}", layer.query.with);
}

// Testable property 5: an unreferenced JoinOne namespace emits no JOIN.
#[test]
fn unreferenced_join_one_namespace_is_elided() {
    let nested = duckdb_model(Source::table("customers"));
    let model = duckdb_model(Source::table("orders")).with_join_one(
        "customer",
        nested,
        ColumnExpression::column("customer_id").eq(ColumnExpression::column("id")),
        false,
    );

    let sql = compile_sql(&model, Dialect::Postgres).unwrap();
    assert!(!sql.to_uppercase().contains("JOIN"), "unreferenced join should be elided, got: {sql}");
}

// The mirror image: a JoinOne namespace referenced by a later Pick keeps its JOIN.
#[test]
fn referenced_join_one_namespace_keeps_its_join() {
    let nested = duckdb_model(Source::table("customers"));
    let model = duckdb_model(Source::table("orders"))
        .with_join_one(
            "customer",
            nested,
            ColumnExpression::column("customer_id").eq(ColumnExpression::column("id")),
            false,
        )
        .with_pick(vec![ColumnExpression::column("id").disambiguated("customer")]);

    let sql = compile_sql(&model, Dialect::Postgres).unwrap();
    assert!(sql.to_uppercase().contains("JOIN"), "referenced join should be kept, got: {sql}");
}

#[test]
fn pick_filter_sort_limit_chain_compiles_without_error() {
    let model = duckdb_model(Source::table("sales"))
        .with_filter(ColumnExpression::column("status").eq(ColumnExpression::str_lit("paid")))
        .with_sort(ColumnExpression::column("ts"), SortDir::Desc)
        .with_limit(10, Some(5));

    let sql = compile_sql(&model, Dialect::DuckDb).unwrap();
    assert!(sql.contains("WHERE"), "got: {sql}");
    assert!(sql.contains("ORDER BY"), "got: {sql}");
    assert!(sql.contains("LIMIT"), "got: {sql}");
}

#[test]
fn no_op_pick_matching_the_base_columns_is_folded_away() {
    // A Pick whose selection set exactly equals the base's own column set
    // is a planning no-op (spec.md §4.4); this asserts it doesn't explode
    // into a redundant extra layer.
    let model = duckdb_model(Source::table("sales"));
    let sql = compile_sql(&model, Dialect::DuckDb).unwrap();
    assert!(sql.contains("SELECT"), "got: {sql}");
}
