//! Integration tests for the `Source` relational-plan IR (spec.md §3,
//! §4.4, §8 testable property 4 "CTE reuse" at the wire-key level).

use mantis::model::{ActivitySchema, ColumnExpression, Model, Namespace, ConnectionHandle, Source, SortDir};

fn sales() -> Source {
    Source::table("sales")
}

#[test]
fn builder_methods_chain_into_a_linear_plan() {
    let plan = sales()
        .filter(ColumnExpression::column("status").eq(ColumnExpression::str_lit("paid")))
        .sort(ColumnExpression::column("ts"), SortDir::Desc)
        .limit(10, Some(5));

    assert!(matches!(plan, Source::Limit { .. }));
    let sort = plan.base().unwrap();
    assert!(matches!(sort, Source::Sort { dir: SortDir::Desc, .. }));
    let filter = sort.base().unwrap();
    assert!(matches!(filter, Source::Filter { .. }));
    let leaf = filter.base().unwrap();
    assert!(matches!(leaf, Source::TableName { table, .. } if table == "sales"));
    assert!(leaf.base().is_none());
}

#[test]
fn table_in_schema_carries_the_schema_name() {
    let t = Source::table_in_schema("orders", "public");
    match t {
        Source::TableName { table, schema } => {
            assert_eq!(table, "orders");
            assert_eq!(schema.as_deref(), Some("public"));
        }
        _ => panic!("expected a TableName"),
    }
}

#[test]
fn stable_key_is_structural_not_identity_based() {
    let a = sales().filter(ColumnExpression::column("x").eq(ColumnExpression::int(1)));
    let b = sales().filter(ColumnExpression::column("x").eq(ColumnExpression::int(1)));
    let c = sales().filter(ColumnExpression::column("x").eq(ColumnExpression::int(2)));

    assert_eq!(a.stable_key(), b.stable_key());
    assert_ne!(a.stable_key(), c.stable_key());
}

#[test]
fn join_one_wraps_a_namespace_and_preserves_drop_unmatched() {
    let nested = Model::new(ConnectionHandle::new("duckdb"), Source::table("customers"));
    let ns = Namespace::new("customer", nested);
    let plan = sales().join_one(ns.clone(), ColumnExpression::column("customer_id").eq(ColumnExpression::column("id")), true);

    match plan {
        Source::JoinOne { relation, drop_unmatched, .. } => {
            assert_eq!(relation.identifier, "customer");
            assert!(drop_unmatched);
        }
        _ => panic!("expected a JoinOne"),
    }
}

#[test]
fn union_wraps_both_branches() {
    let plan = sales().union(Source::table("returns"));
    match plan {
        Source::Union { base, other } => {
            assert!(matches!(*base, Source::TableName { ref table, .. } if table == "sales"));
            assert!(matches!(*other, Source::TableName { ref table, .. } if table == "returns"));
        }
        _ => panic!("expected a Union"),
    }
}

#[test]
fn match_steps_carries_the_activity_schema_and_step_list() {
    let schema = ActivitySchema {
        group: ColumnExpression::column("user_id"),
        timestamp: ColumnExpression::column("occurred_at"),
        event_key: ColumnExpression::column("event"),
    };
    let steps = vec![
        ColumnExpression::column("event").eq(ColumnExpression::str_lit("signup")),
        ColumnExpression::column("event").eq(ColumnExpression::str_lit("purchase")),
    ];
    let plan = Source::table("events").match_steps(schema, steps.clone(), vec![], Some(3600));

    match plan {
        Source::MatchSteps { steps: s, time_limit_seconds, .. } => {
            assert_eq!(s.len(), 2);
            assert_eq!(time_limit_seconds, Some(3600));
        }
        _ => panic!("expected a MatchSteps"),
    }
}

#[test]
fn limit_without_offset_defaults_offset_to_none() {
    let plan = sales().limit(20, None);
    match plan {
        Source::Limit { limit, offset, .. } => {
            assert_eq!(limit, Some(20));
            assert_eq!(offset, None);
        }
        _ => panic!("expected a Limit"),
    }
}
