//! Integration tests for `ColumnExpression` (spec.md §3, §8 testable
//! properties 1-3).

use mantis::model::{ColumnExpression, Grain, Literal, Operator};

#[test]
fn column_name_default_identifier_is_its_own_name() {
    let expr = ColumnExpression::column("revenue");
    assert_eq!(expr.default_identifier(), Some("revenue".to_string()));
    assert_eq!(expr.effective_identifier(), Some("revenue".to_string()));
}

#[test]
fn manually_set_identifier_overrides_the_default() {
    let expr = ColumnExpression::column("revenue").named("total_revenue");
    assert_eq!(expr.manually_set_identifier(), Some("total_revenue"));
    assert_eq!(expr.effective_identifier(), Some("total_revenue".to_string()));
}

#[test]
fn star_has_no_identifier_and_cannot_be_named_into_one() {
    let star = ColumnExpression::star();
    assert!(star.is_star());
    assert_eq!(star.default_identifier(), None);
    assert_eq!(star.effective_identifier(), None);
}

#[test]
fn sql_text_default_identifier_does_not_mirror_the_original_off_by_one_bug() {
    // spec.md §9 open question: a single-token SQL body's default
    // identifier is that token itself, not an out-of-range panic/`None`.
    let single_token = ColumnExpression::sql("amount");
    assert_eq!(single_token.default_identifier(), Some("amount".to_string()));

    let multi_token = ColumnExpression::sql("a.amount + 1");
    assert_eq!(multi_token.default_identifier(), Some("1".to_string()));
}

#[test]
fn binary_op_and_cases_and_subquery_have_no_default_identifier() {
    let cmp = ColumnExpression::column("x").eq(ColumnExpression::int(1));
    assert_eq!(cmp.default_identifier(), None);

    let cases = ColumnExpression::cases(
        vec![(ColumnExpression::column("x").eq(ColumnExpression::int(1)), ColumnExpression::str_lit("a"))],
        Some(ColumnExpression::str_lit("b")),
    );
    assert_eq!(cases.default_identifier(), None);
}

#[test]
fn granularity_and_format_timestamp_inherit_the_base_expressions_identifier() {
    let base = ColumnExpression::column("created_at");
    let by_week = base.clone().by_week();
    assert_eq!(by_week.default_identifier(), Some("created_at".to_string()));

    let formatted = base.format("%Y-%m");
    assert_eq!(formatted.default_identifier(), Some("created_at".to_string()));
}

#[test]
fn sql_function_default_identifier_is_the_function_name_unless_inheriting() {
    let count = ColumnExpression::func("count", vec![]);
    assert_eq!(count.default_identifier(), Some("count".to_string()));
}

#[test]
fn cases_requires_at_least_one_case_struct_invariant() {
    // The constructor itself does not panic on an empty case list; the
    // "at least one case" invariant (spec.md §3) is enforced at compile
    // time (`UserCompilationError::EmptyCases`), not at construction.
    let empty = ColumnExpression::cases(vec![], Some(ColumnExpression::int(1)));
    match empty {
        ColumnExpression::Cases { cases, .. } => assert!(cases.is_empty()),
        _ => panic!("expected a Cases node"),
    }
}

#[test]
fn disambiguated_binds_a_namespace_onto_column_name_and_propagates_into_children() {
    let expr = ColumnExpression::column("id");
    let bound = expr.disambiguated("parent");
    match bound {
        ColumnExpression::ColumnName { namespace_identifier, .. } => {
            assert_eq!(namespace_identifier.as_deref(), Some("parent"));
        }
        _ => panic!("expected a ColumnName"),
    }

    let binop = ColumnExpression::column("id").eq(ColumnExpression::column("parent_id"));
    let bound_binop = binop.disambiguated("parent");
    match bound_binop {
        ColumnExpression::BinaryOp { left, right, .. } => {
            assert!(matches!(*left, ColumnExpression::ColumnName { namespace_identifier: Some(ref ns), .. } if ns == "parent"));
            assert!(matches!(*right, ColumnExpression::ColumnName { namespace_identifier: Some(ref ns), .. } if ns == "parent"));
        }
        _ => panic!("expected a BinaryOp"),
    }
}

#[test]
fn disambiguated_does_not_mutate_the_original_expression() {
    let expr = ColumnExpression::column("id");
    let before = expr.clone();
    let _ = expr.disambiguated("parent");
    assert_eq!(expr, before);
}

#[test]
fn operator_builder_methods_produce_the_expected_binary_op_shape() {
    let lhs = ColumnExpression::column("amount");
    let rhs = ColumnExpression::int(100);

    let cases: Vec<(ColumnExpression, Operator)> = vec![
        (lhs.clone().eq(rhs.clone()), Operator::Eq),
        (lhs.clone().ne(rhs.clone()), Operator::Ne),
        (lhs.clone().lt(rhs.clone()), Operator::Lt),
        (lhs.clone().lte(rhs.clone()), Operator::Lte),
        (lhs.clone().gt(rhs.clone()), Operator::Gt),
        (lhs.clone().gte(rhs.clone()), Operator::Gte),
        (lhs.clone().add(rhs.clone()), Operator::Add),
        (lhs.clone().sub(rhs.clone()), Operator::Sub),
        (lhs.clone().mul(rhs.clone()), Operator::Mul),
        (lhs.clone().div(rhs.clone()), Operator::Div),
        (lhs.clone().like(rhs.clone()), Operator::Like),
    ];

    for (expr, expected_op) in cases {
        match expr {
            ColumnExpression::BinaryOp { op, .. } => assert_eq!(op, expected_op),
            _ => panic!("expected a BinaryOp"),
        }
    }
}

#[test]
fn in_list_compiles_to_an_in_binary_op_with_a_list_literal() {
    let expr = ColumnExpression::column("status").in_list(vec![Literal::Str("paid".into()), Literal::Null]);
    match expr {
        ColumnExpression::BinaryOp { op, right, .. } => {
            assert_eq!(op, Operator::In);
            assert!(matches!(*right, ColumnExpression::PyValue { value: Literal::List(_), .. }));
        }
        _ => panic!("expected a BinaryOp"),
    }
}

#[test]
fn by_grain_and_convenience_methods_agree() {
    let base = ColumnExpression::column("ts");
    assert_eq!(base.clone().by_grain(Grain::Day), base.clone().by_day());
    assert_eq!(base.clone().by_grain(Grain::Week), base.clone().by_week());
    assert_eq!(base.clone().by_grain(Grain::Month), base.clone().by_month());
    assert_eq!(base.clone().by_grain(Grain::Year), base.clone().by_year());
}

#[test]
fn stable_key_is_deterministic_and_sensitive_to_structure() {
    let a = ColumnExpression::column("revenue").named("x");
    let b = ColumnExpression::column("revenue").named("x");
    let c = ColumnExpression::column("cost").named("x");

    assert_eq!(a.stable_key(), b.stable_key());
    assert_ne!(a.stable_key(), c.stable_key());
}

#[test]
fn children_walks_every_variant_without_panicking() {
    let leaf = ColumnExpression::column("x");
    assert!(leaf.children().is_empty());

    let binop = ColumnExpression::column("x").eq(ColumnExpression::int(1));
    assert_eq!(binop.children().len(), 2);

    let cases = ColumnExpression::cases(
        vec![(ColumnExpression::column("x").eq(ColumnExpression::int(1)), ColumnExpression::int(2))],
        Some(ColumnExpression::int(3)),
    );
    assert_eq!(cases.children().len(), 3);

    let func = ColumnExpression::func("coalesce", vec![ColumnExpression::column("a"), ColumnExpression::column("b")]);
    assert_eq!(func.children().len(), 2);
}

#[test]
fn wire_version_is_a_stable_positive_constant() {
    assert!(ColumnExpression::wire_version() >= 1);
}
