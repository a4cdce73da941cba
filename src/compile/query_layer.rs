//! One emitted SELECT statement under construction (spec.md §4.3).
//!
//! Grounded on `original_source/src/run/compile/query_layer.py`'s fold/chain
//! state machine, targeting this crate's own `sql::query::Query` builder as
//! the physical renderer. A `QueryLayer` tracks enough about the statement
//! it wraps (is it aggregated? does it already have a LIMIT?) to tell the
//! source compiler whether the next operation can fold into the current
//! SELECT or must start a fresh one addressed through a CTE.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::execution_driver::ColumnTypeMap;
use crate::model::DataType;
use crate::sql::expr::{table_col, Expr};
use crate::sql::query::{Cte, JoinType, Query, TableRef};

use super::context::QueryContext;

/// What a joined relation is addressable as inside the current statement.
#[derive(Debug, Clone)]
pub struct NamespaceBinding {
    pub alias: String,
    pub columns: ColumnTypeMap,
}

/// A single in-progress SELECT and everything needed to keep extending it
/// or to fold it away into a CTE (spec.md §4.3, §4.4).
pub struct QueryLayer {
    pub query: Query,
    pub main_alias: String,
    pub main_columns: ColumnTypeMap,
    pub namespaces: BTreeMap<String, NamespaceBinding>,
    pub is_aggregated: bool,
    pub has_limit: bool,
    pub has_order_by: bool,
    /// Namespace identifiers actually referenced by a compiled column
    /// expression against this layer, populated as `column_ref` resolves
    /// each reference. Shared with any `JoinOne` finalize hook registered
    /// on this layer so the hook can tell, once every downstream
    /// expression has compiled, whether its join was ever addressed
    /// (spec.md §4.4 "emits the JOIN only if the join's namespace was
    /// referenced"; §8 testable property 5 "Join elision").
    used_namespaces: Rc<RefCell<BTreeSet<String>>>,
    finalize_hooks: Vec<Box<dyn FnOnce(&mut Query)>>,
}

impl QueryLayer {
    /// A fresh layer reading directly from a physical table or CTE.
    pub fn from_table(alias: &str, table: TableRef, columns: ColumnTypeMap) -> Self {
        QueryLayer {
            query: Query::new().select_star().from(table),
            main_alias: alias.to_string(),
            main_columns: columns,
            namespaces: BTreeMap::new(),
            is_aggregated: false,
            has_limit: false,
            has_order_by: false,
            used_namespaces: Rc::new(RefCell::new(BTreeSet::new())),
            finalize_hooks: Vec::new(),
        }
    }

    /// Whether a `Pick`/`Filter` can still fold into the SELECT list/WHERE
    /// clause of the current statement, or whether a LIMIT already fixed
    /// the row set and a new statement is required (spec.md §4.4).
    pub fn can_fold(&self) -> bool {
        !self.has_limit
    }

    /// Resolve a `ColumnName` reference to a physical column expression,
    /// qualified by the namespace's join alias when it names a joined
    /// relation rather than the layer's own main relation.
    pub fn column_ref(&self, namespace: Option<&str>, name: &str) -> Expr {
        match namespace {
            Some(ns) if ns != self.main_alias => {
                let alias = match self.namespaces.get(ns) {
                    Some(binding) => {
                        self.used_namespaces.borrow_mut().insert(ns.to_string());
                        binding.alias.clone()
                    }
                    None => ns.to_string(),
                };
                table_col(&alias, name)
            }
            _ => table_col(&self.main_alias, name),
        }
    }

    /// A handle a `JoinOne` finalize hook can stash away and re-check once
    /// every other column reference against this layer has compiled
    /// (spec.md §4.4, §8 "Join elision").
    pub fn used_namespaces_handle(&self) -> Rc<RefCell<BTreeSet<String>>> {
        self.used_namespaces.clone()
    }

    pub fn column_type(&self, namespace: Option<&str>, name: &str) -> DataType {
        match namespace {
            Some(ns) if ns != self.main_alias => self
                .namespaces
                .get(ns)
                .and_then(|b| b.columns.get(name))
                .copied()
                .unwrap_or_default(),
            _ => self.main_columns.get(name).copied().unwrap_or_default(),
        }
    }

    pub fn bind_namespace(&mut self, identifier: &str, binding: NamespaceBinding) {
        self.namespaces.insert(identifier.to_string(), binding);
    }

    pub fn add_join(&mut self, join_type: JoinType, table: TableRef, on: Expr) {
        self.query = std::mem::take(&mut self.query).join(join_type, table, on);
    }

    /// A hook to run just before this layer is folded into a CTE or handed
    /// off as the final statement - e.g. `MatchSteps` registering a
    /// dialect-specific error handler only once the funnel CTE text is
    /// known (spec.md §4.6).
    pub fn add_finalize_hook(&mut self, hook: Box<dyn FnOnce(&mut Query)>) {
        self.finalize_hooks.push(hook);
    }

    pub fn finalized(&mut self) {
        let hooks = std::mem::take(&mut self.finalize_hooks);
        for hook in hooks {
            hook(&mut self.query);
        }
    }

    /// Fold the current statement away as a named CTE and return a fresh
    /// layer selecting from it - the "new query layer" half of spec.md
    /// §4.4's fold-vs-chain decision. Column metadata about the previous
    /// main relation carries forward; joined-namespace bindings do not,
    /// since they addressed aliases scoped to the statement just closed.
    pub fn chained(mut self, ctx: &QueryContext) -> QueryLayer {
        self.finalized();
        let cte_name = ctx.next_cte_name();

        let mut outer_ctes = std::mem::take(&mut self.query.with);
        outer_ctes.push(Cte::new(&cte_name, self.query));

        let mut fresh = outer_ctes
            .into_iter()
            .fold(Query::new(), |q, cte| q.with_cte(cte));
        fresh = fresh.from(TableRef::new(&cte_name).with_alias(&cte_name));

        QueryLayer {
            query: fresh,
            main_alias: cte_name,
            main_columns: self.main_columns,
            namespaces: BTreeMap::new(),
            is_aggregated: false,
            has_limit: false,
            has_order_by: false,
            used_namespaces: Rc::new(RefCell::new(BTreeSet::new())),
            finalize_hooks: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::sql::Dialect;

    #[test]
    fn column_ref_qualifies_by_main_alias() {
        let layer = QueryLayer::from_table("t", TableRef::new("orders").with_alias("t"), ColumnTypeMap::new());
        let expr = layer.column_ref(None, "amount");
        assert_eq!(expr, table_col("t", "amount"));
    }

    #[test]
    fn chained_wraps_as_cte_and_resets_limit_flag() {
        let ctx = QueryContext::new(Dialect::Postgres, Settings::default(), None);
        let mut layer = QueryLayer::from_table("t", TableRef::new("orders").with_alias("t"), ColumnTypeMap::new());
        layer.has_limit = true;
        let next = layer.chained(&ctx);
        assert!(!next.has_limit);
        assert_eq!(next.query.with.len(), 1);
    }
}
